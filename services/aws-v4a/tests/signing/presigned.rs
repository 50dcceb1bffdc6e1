use super::*;
use anyhow::Result;
use chrono::TimeDelta;
use sigv4a::{verify_request, RegionSet, RequestSigner, SigningConfig};
use sigv4a_core::{ErrorKind, SignableBody};
use std::time::Duration;
use test_case::test_case;

#[test_case(0, false; "zero")]
#[test_case(1, true; "one second")]
#[test_case(3600, true; "one hour")]
#[test_case(604800, true; "seven days")]
#[test_case(604801, false; "beyond seven days")]
fn test_presign_expiry_boundary(secs: u64, ok: bool) {
    let req = request("GET", "https://example.amazonaws.com/object", &[]);
    let config = SigningConfig::new("exampleservice", RegionSet::Any)
        .with_presign(Duration::from_secs(secs));

    let res = RequestSigner::new().sign(&context(), &req, SignableBody::empty(), &credential(), &config);
    match res {
        Ok(_) => assert!(ok, "expiry {secs}s must be rejected"),
        Err(err) => {
            assert!(!ok, "expiry {secs}s must be accepted");
            assert_eq!(err.kind(), ErrorKind::SigningExpired);
        }
    }
}

#[test]
fn test_presigned_request_carries_all_parameters() -> Result<()> {
    let req = request("GET", "https://example.amazonaws.com/object?partNumber=1", &[]);
    let config = SigningConfig::new("exampleservice", RegionSet::new(["us-east-1", "eu-west-1"])?)
        .with_presign(Duration::from_secs(900));
    let signed = RequestSigner::new().sign(
        &context(),
        &req,
        SignableBody::empty(),
        &credential().with_session_token("token"),
        &config,
    )?;

    let query: Vec<(String, String)> =
        form_urlencoded::parse(signed.parts().uri.query().unwrap_or_default().as_bytes())
            .into_owned()
            .collect();
    let get = |k: &str| {
        query
            .iter()
            .find(|(key, _)| key == k)
            .map(|(_, v)| v.as_str())
    };

    assert_eq!(get("partNumber"), Some("1"));
    assert_eq!(get("X-Amz-Algorithm"), Some("AWS4-ECDSA-P256-SHA256"));
    assert_eq!(
        get("X-Amz-Credential"),
        Some("AKIDEXAMPLE/20150830/us-east-1,eu-west-1/exampleservice/aws4_request")
    );
    assert_eq!(get("X-Amz-Date"), Some("20150830T123600Z"));
    assert_eq!(get("X-Amz-Expires"), Some("900"));
    assert_eq!(get("X-Amz-Region-Set"), Some("us-east-1,eu-west-1"));
    assert_eq!(get("X-Amz-SignedHeaders"), Some("host"));
    assert_eq!(get("X-Amz-Security-Token"), Some("token"));
    assert_eq!(get("X-Amz-Signature"), Some(signed.signature()));
    assert!(signed.parts().headers.get("authorization").is_none());
    Ok(())
}

#[test]
fn test_presigned_request_verifies_until_expiry() -> Result<()> {
    let req = request("GET", "https://example.amazonaws.com/object", &[]);
    let config = SigningConfig::new("exampleservice", RegionSet::Any)
        .with_presign(Duration::from_secs(60));
    let signed = RequestSigner::new().sign(&context(), &req, SignableBody::empty(), &credential(), &config)?;

    let verify_at = |ctx: &sigv4a_core::Context| {
        verify_request(
            ctx,
            signed.parts(),
            SignableBody::empty(),
            &credential(),
            "sa-east-1",
            "exampleservice",
        )
    };

    assert!(verify_at(&context())?);
    assert!(verify_at(&context_at(signing_time() + TimeDelta::seconds(60)))?);

    let err = verify_at(&context_at(signing_time() + TimeDelta::seconds(61))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SigningExpired);

    // Tampering with any signed parameter breaks the signature.
    let mut parts = signed.parts().clone();
    let tampered = parts
        .uri
        .to_string()
        .replace("X-Amz-Expires=60", "X-Amz-Expires=600");
    parts.uri = tampered.parse()?;
    assert!(!verify_request(
        &context(),
        &parts,
        SignableBody::empty(),
        &credential(),
        "sa-east-1",
        "exampleservice",
    )?);
    Ok(())
}
