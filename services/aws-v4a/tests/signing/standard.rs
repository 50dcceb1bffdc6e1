use super::*;
use anyhow::Result;
use http::header;
use pretty_assertions::assert_eq;
use sigv4a::key::derive_key_pair;
use sigv4a::{
    ecdsa, verify_request, CanonicalRequest, PayloadSigning, RegionSet, RequestSigner,
    SigningConfig, StaticCredentialProvider,
};
use sigv4a_core::hash::hex_sha256;
use sigv4a_core::{ErrorKind, SignableBody, Signer, SigningRequest};
use std::io::Cursor;

#[test]
fn test_get_vanilla_with_wildcard_region_set() -> Result<()> {
    let ctx = context();
    let req = request("GET", "https://example.amazonaws.com/", &[]);
    let config = SigningConfig::new("exampleservice", RegionSet::Any);

    let signed = RequestSigner::new().sign(&ctx, &req, SignableBody::empty(), &credential(), &config)?;
    assert_eq!(
        signed.scope().to_string(),
        "20150830/*/exampleservice/aws4_request"
    );

    let creq = CanonicalRequest::build(
        &SigningRequest::build(signed.parts())?,
        "UNSIGNED-PAYLOAD",
        true,
        true,
    )?
    .to_string();
    assert_eq!(
        creq,
        "GET\n\
         /\n\
         \n\
         host:example.amazonaws.com\n\
         x-amz-date:20150830T123600Z\n\
         x-amz-region-set:*\n\
         \n\
         host;x-amz-date;x-amz-region-set\n\
         UNSIGNED-PAYLOAD"
    );

    let string_to_sign = format!(
        "AWS4-ECDSA-P256-SHA256\n20150830T123600Z\n20150830/*/exampleservice/aws4_request\n{}",
        hex_sha256(creq.as_bytes())
    );
    let key = derive_key_pair(ACCESS_KEY_ID, SECRET_ACCESS_KEY)?;
    assert!(ecdsa::verify(
        key.public_key(),
        string_to_sign.as_bytes(),
        signed.signature()
    ));

    assert!(verify_request(
        &ctx,
        signed.parts(),
        SignableBody::empty(),
        &credential(),
        "us-east-1",
        "exampleservice",
    )?);
    Ok(())
}

#[test]
fn test_wildcard_verifies_against_any_region() -> Result<()> {
    let ctx = context();
    let req = request("GET", "https://example.amazonaws.com/", &[]);
    let config = SigningConfig::new("exampleservice", RegionSet::Any);
    let signed = RequestSigner::new().sign(&ctx, &req, SignableBody::empty(), &credential(), &config)?;

    for region in ["us-east-1", "eu-west-1", "ap-southeast-2", "cn-north-1"] {
        assert!(
            verify_request(
                &ctx,
                signed.parts(),
                SignableBody::empty(),
                &credential(),
                region,
                "exampleservice",
            )?,
            "wildcard signature must verify at {region}"
        );
    }

    // Same signature, wrong service.
    assert!(!verify_request(
        &ctx,
        signed.parts(),
        SignableBody::empty(),
        &credential(),
        "us-east-1",
        "otherservice",
    )?);
    Ok(())
}

#[test]
fn test_region_list_only_covers_listed_regions() -> Result<()> {
    let ctx = context();
    let req = request("GET", "https://example.amazonaws.com/", &[]);
    let config = SigningConfig::new(
        "exampleservice",
        RegionSet::new(["us-east-1", "us-west-2"])?,
    );
    let signed = RequestSigner::new().sign(&ctx, &req, SignableBody::empty(), &credential(), &config)?;
    assert_eq!(
        signed.parts().headers["x-amz-region-set"],
        "us-east-1,us-west-2"
    );

    let verify_at = |region: &str| {
        verify_request(
            &ctx,
            signed.parts(),
            SignableBody::empty(),
            &credential(),
            region,
            "exampleservice",
        )
    };
    assert!(verify_at("us-east-1")?);
    assert!(verify_at("us-west-2")?);
    assert!(!verify_at("eu-west-1")?);
    Ok(())
}

#[test]
fn test_tampered_request_fails_verification() -> Result<()> {
    let ctx = context();
    let req = request(
        "PUT",
        "https://example.amazonaws.com/key?versionId=1",
        &[("x-amz-meta-owner", "alice")],
    );
    let config = SigningConfig::new("exampleservice", RegionSet::Any)
        .with_payload(PayloadSigning::Signed);
    let signed = RequestSigner::new().sign(
        &ctx,
        &req,
        SignableBody::Bytes(b"Hello,World!"),
        &credential(),
        &config,
    )?;
    let verify = |parts: &http::request::Parts, body: &[u8]| {
        verify_request(
            &ctx,
            parts,
            SignableBody::Bytes(body),
            &credential(),
            "us-east-1",
            "exampleservice",
        )
    };

    assert!(verify(signed.parts(), b"Hello,World!")?);
    assert!(!verify(signed.parts(), b"Hello,World?")?);

    let mut parts = signed.parts().clone();
    parts
        .headers
        .insert("x-amz-meta-owner", "mallory".parse()?);
    assert!(!verify(&parts, b"Hello,World!")?);

    let mut parts = signed.parts().clone();
    parts.uri = "https://example.amazonaws.com/key?versionId=2".parse()?;
    assert!(!verify(&parts, b"Hello,World!")?);

    // Unsigned headers can change freely.
    let mut parts = signed.parts().clone();
    parts.headers.insert(header::USER_AGENT, "curl/8.0".parse()?);
    parts.headers.insert("x-unsigned", "added".parse()?);
    assert!(verify(&parts, b"Hello,World!")?);

    let other = sigv4a::Credential::new(ACCESS_KEY_ID, "another-secret");
    assert!(!verify_request(
        &ctx,
        signed.parts(),
        SignableBody::Bytes(b"Hello,World!"),
        &other,
        "us-east-1",
        "exampleservice",
    )?);
    Ok(())
}

#[test]
fn test_seekable_body_is_hashed_and_rewound() -> Result<()> {
    let ctx = context();
    let req = request("PUT", "https://bucket.s3.amazonaws.com/a%20b/../c.txt", &[]);
    let config = SigningConfig::new("s3", RegionSet::Any).with_payload(PayloadSigning::Signed);

    let mut body = Cursor::new(b"streamed content".to_vec());
    let signed = RequestSigner::new().sign(
        &ctx,
        &req,
        SignableBody::Seekable(&mut body),
        &credential(),
        &config,
    )?;
    assert_eq!(body.position(), 0);
    assert_eq!(
        signed.parts().headers["x-amz-content-sha256"],
        hex_sha256(b"streamed content").as_str()
    );
    // S3 signs the path as sent.
    assert_eq!(signed.parts().uri.path(), "/a%20b/../c.txt");

    assert!(verify_request(
        &ctx,
        signed.parts(),
        SignableBody::Seekable(&mut body),
        &credential(),
        "us-east-1",
        "s3",
    )?);
    Ok(())
}

#[test]
fn test_session_token_is_signed() -> Result<()> {
    let ctx = context();
    let req = request("GET", "https://example.amazonaws.com/", &[]);
    let cred = credential().with_session_token("AQoDYXdzEPT//////////wEXAMPLE");
    let config = SigningConfig::new("exampleservice", RegionSet::Any);

    let signed = RequestSigner::new().sign(&ctx, &req, SignableBody::empty(), &cred, &config)?;
    let authorization = signed.parts().headers[header::AUTHORIZATION].to_str()?;
    assert!(authorization.contains("SignedHeaders=host;x-amz-date;x-amz-region-set;x-amz-security-token,"));

    assert!(verify_request(
        &ctx,
        signed.parts(),
        SignableBody::empty(),
        &cred,
        "us-east-1",
        "exampleservice",
    )?);
    Ok(())
}

#[test]
fn test_request_without_signature_is_invalid() {
    let ctx = context();
    let req = request("GET", "https://example.amazonaws.com/", &[]);

    let err = verify_request(
        &ctx,
        &req,
        SignableBody::empty(),
        &credential(),
        "us-east-1",
        "exampleservice",
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RequestInvalid);
}

#[tokio::test]
async fn test_signer_with_static_provider() -> Result<()> {
    let ctx = context();
    let signer = Signer::new(
        ctx.clone(),
        StaticCredentialProvider::new(ACCESS_KEY_ID, SECRET_ACCESS_KEY),
        RequestSigner::new(),
    );

    let req = request("GET", "https://example.amazonaws.com/", &[]);
    let config = SigningConfig::new("exampleservice", RegionSet::Any);
    let signed = signer.sign(&req, SignableBody::empty(), &config).await?;

    assert!(signed.headers.contains_key(header::AUTHORIZATION));
    assert!(req.headers.is_empty());
    assert!(verify_request(
        &ctx,
        &signed,
        SignableBody::empty(),
        &credential(),
        "us-west-2",
        "exampleservice",
    )?);
    Ok(())
}

#[tokio::test]
async fn test_signer_without_credential() {
    let ctx = context();
    let signer = Signer::new(
        ctx,
        sigv4a::EnvCredentialProvider::new(),
        RequestSigner::new(),
    );

    let req = request("GET", "https://example.amazonaws.com/", &[]);
    let config = SigningConfig::new("exampleservice", RegionSet::Any);
    let err = signer
        .sign(&req, SignableBody::empty(), &config)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingCredentials);
}
