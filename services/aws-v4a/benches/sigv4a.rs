use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;
use once_cell::sync::Lazy;
use sigv4a::key::derive_key_pair;
use sigv4a::{RegionSet, RequestSigner, SigningConfig, StaticCredentialProvider};
use sigv4a_core::{Context, SignableBody, Signer};

criterion_group!(benches, bench);
criterion_main!(benches);

static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("must success")
});

pub fn bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("sigv4a");

    group.bench_function("derive_key_pair", |b| {
        b.iter(|| derive_key_pair("access_key_id", "secret_access_key").expect("must success"))
    });

    group.bench_function("sign_header", |b| {
        let signer = Signer::new(
            Context::new(),
            StaticCredentialProvider::new("access_key_id", "secret_access_key"),
            RequestSigner::new(),
        );
        let config = SigningConfig::new("s3", RegionSet::Any);

        b.to_async(&*RUNTIME).iter(|| async {
            let (parts, _) = http::Request::get("http://127.0.0.1:9000/hello")
                .body(())
                .expect("request must be valid")
                .into_parts();

            signer
                .sign(&parts, SignableBody::empty(), &config)
                .await
                .expect("must success")
        })
    });

    group.bench_function("sign_chunk", |b| {
        let ctx = Context::new();
        let (parts, _) = http::Request::put("http://127.0.0.1:9000/hello")
            .body(())
            .expect("request must be valid")
            .into_parts();
        let config = SigningConfig::new("s3", RegionSet::Any)
            .with_payload(sigv4a::PayloadSigning::Streaming);
        let cred = sigv4a::Credential::new("access_key_id", "secret_access_key");
        let signed = RequestSigner::new()
            .sign(&ctx, &parts, SignableBody::empty(), &cred, &config)
            .expect("must success");
        let chunk = vec![0u8; 64 * 1024];

        b.iter(|| {
            let mut signer = signed.chunk_signer().expect("must success");
            signer.encode_chunk(&chunk).expect("must success")
        })
    });

    group.finish()
}
