use super::*;
use anyhow::Result;
use http::HeaderMap;
use pretty_assertions::assert_eq;
use sigv4a::key::derive_key_pair;
use sigv4a::{
    signed_content_length, verify_chunk, verify_request, verify_trailer, PayloadSigning,
    RegionSet, RequestSigner, SignedRequest, SigningConfig,
};
use sigv4a_core::{ErrorKind, SignableBody};

fn sign_streaming(payload: PayloadSigning, decoded_len: usize) -> Result<SignedRequest> {
    let req = request(
        "PUT",
        "https://bucket.s3.amazonaws.com/object",
        &[
            ("content-encoding", "aws-chunked"),
            ("x-amz-decoded-content-length", &decoded_len.to_string()),
        ],
    );
    let config = SigningConfig::new("s3", RegionSet::Any).with_payload(payload);
    Ok(RequestSigner::new().sign(&context(), &req, SignableBody::empty(), &credential(), &config)?)
}

#[test]
fn test_streaming_request_header_signature() -> Result<()> {
    let signed = sign_streaming(PayloadSigning::Streaming, 11)?;
    assert_eq!(
        signed.parts().headers["x-amz-content-sha256"],
        "STREAMING-AWS4-ECDSA-P256-SHA256-PAYLOAD"
    );
    assert!(verify_request(
        &context(),
        signed.parts(),
        SignableBody::empty(),
        &credential(),
        "us-east-1",
        "s3",
    )?);
    Ok(())
}

#[test]
fn test_chunk_chain_verifies() -> Result<()> {
    let signed = sign_streaming(PayloadSigning::Streaming, 11)?;
    let key = derive_key_pair(ACCESS_KEY_ID, SECRET_ACCESS_KEY)?;
    let chunks: [&[u8]; 3] = [b"hello", b" world", b""];

    let mut signer = signed.chunk_signer()?;
    let signatures = chunks
        .iter()
        .map(|c| signer.sign_chunk(c))
        .collect::<sigv4a_core::Result<Vec<_>>>()?;
    assert!(signer.is_done());

    let mut prev = signed.signature().to_string();
    for (chunk, signature) in chunks.iter().zip(&signatures) {
        assert!(verify_chunk(
            key.public_key(),
            signed.time(),
            signed.scope(),
            &prev,
            chunk,
            signature
        )?);
        prev = signature.clone();
    }
    Ok(())
}

#[test]
fn test_altered_or_reordered_chunks_break_the_chain() -> Result<()> {
    let signed = sign_streaming(PayloadSigning::Streaming, 11)?;
    let key = derive_key_pair(ACCESS_KEY_ID, SECRET_ACCESS_KEY)?;

    let mut signer = signed.chunk_signer()?;
    let first = signer.sign_chunk(b"hello")?;
    let second = signer.sign_chunk(b" world")?;
    let last = signer.sign_chunk(b"")?;

    let check = |prev: &str, chunk: &[u8], sig: &str| {
        verify_chunk(key.public_key(), signed.time(), signed.scope(), prev, chunk, sig)
    };

    // Altered payload.
    assert!(!check(signed.signature(), b"HELLO", &first)?);
    // Reordered chunks.
    assert!(!check(signed.signature(), b" world", &second)?);
    assert!(!check(&second, b"hello", &first)?);
    // A later link built on an altered earlier link.
    assert!(!check(&first, b" world", &last)?);
    // The untouched chain still holds.
    assert!(check(signed.signature(), b"hello", &first)?);
    assert!(check(&first, b" world", &second)?);
    assert!(check(&second, b"", &last)?);
    Ok(())
}

#[test]
fn test_trailer_is_chained_from_final_chunk() -> Result<()> {
    let signed = sign_streaming(PayloadSigning::StreamingWithTrailer, 5)?;
    assert_eq!(
        signed.parts().headers["x-amz-content-sha256"],
        "STREAMING-AWS4-ECDSA-P256-SHA256-PAYLOAD-TRAILER"
    );
    let key = derive_key_pair(ACCESS_KEY_ID, SECRET_ACCESS_KEY)?;

    let mut trailers = HeaderMap::new();
    trailers.insert("x-amz-checksum-crc32", "NhCmhg==".parse()?);

    let mut signer = signed.chunk_signer()?;
    signer.sign_chunk(b"hello")?;
    let last = signer.sign_chunk(b"")?;
    let trailer = signer.sign_trailer(&trailers)?;

    assert!(verify_trailer(
        key.public_key(),
        signed.time(),
        signed.scope(),
        &last,
        &trailers,
        &trailer
    )?);

    let mut altered = trailers.clone();
    altered.insert("x-amz-checksum-crc32", "AAAAAA==".parse()?);
    assert!(!verify_trailer(
        key.public_key(),
        signed.time(),
        signed.scope(),
        &last,
        &altered,
        &trailer
    )?);

    let err = signer.sign_chunk(b"more").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChunkSequence);
    Ok(())
}

#[test]
fn test_encoded_body_matches_signed_content_length() -> Result<()> {
    let body = vec![b'x'; 70000];
    let chunk_size = 65536;
    let signed = sign_streaming(PayloadSigning::Streaming, body.len())?;
    let key = derive_key_pair(ACCESS_KEY_ID, SECRET_ACCESS_KEY)?;

    let mut signer = signed.chunk_signer()?;
    let mut encoded = Vec::new();
    for chunk in body.chunks(chunk_size) {
        encoded.extend_from_slice(&signer.encode_chunk(chunk)?);
    }
    encoded.extend_from_slice(&signer.encode_chunk(b"")?);

    assert_eq!(
        encoded.len() as u64,
        signed_content_length(body.len() as u64, chunk_size as u64, None)?
    );

    // Walk the frames and check every signature against the chain.
    let text = String::from_utf8_lossy(&encoded).into_owned();
    let mut rest = text.as_str();
    let mut prev = signed.signature().to_string();
    loop {
        let (head, tail) = rest.split_once("\r\n").expect("frame header");
        let (len, sig) = head.split_once(";chunk-signature=").expect("signature");
        let len = usize::from_str_radix(len, 16)?;
        let data = &tail.as_bytes()[..len];
        assert!(verify_chunk(
            key.public_key(),
            signed.time(),
            signed.scope(),
            &prev,
            data,
            sig
        )?);
        prev = sig.trim_end_matches('*').to_string();
        rest = &tail[len + 2..];
        if len == 0 {
            break;
        }
    }
    assert!(rest.is_empty());
    Ok(())
}
