//! Minimal AWS Signature Version 4 signer, just enough to sign a single
//! POST request with a JSON body against the `bedrock` service. There is
//! no general-purpose AWS SDK dependency in this workspace, so this is
//! hand-rolled rather than pulled in wholesale for one call shape.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

type HmacSha256 = Hmac<Sha256>;

pub(crate) struct SignedRequest {
    pub(crate) headers: Vec<(String, String)>,
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Signs a `POST host+path` request, returning the headers to attach
/// (`host`, `x-amz-date`, `x-amz-content-sha256`, `authorization`).
#[allow(clippy::too_many_arguments)]
pub(crate) fn sign_post(
    region: &str,
    service: &str,
    access_key_id: &str,
    secret_access_key: &str,
    host: &str,
    path: &str,
    body: &[u8],
) -> SignedRequest {
    let amz_date = amz_date(OffsetDateTime::now_utc());
    let date_stamp = &amz_date[..8];
    let payload_hash = sha256_hex(body);

    let canonical_headers = format!(
        "content-type:application/json\nhost:{host}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n"
    );
    let signed_headers = "content-type;host;x-amz-content-sha256;x-amz-date";
    let canonical_request = format!(
        "POST\n{path}\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
    );

    let credential_scope = format!("{date_stamp}/{region}/{service}/aws4_request");
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{credential_scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let k_date = hmac_sha256(format!("AWS4{secret_access_key}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    let k_signing = hmac_sha256(&k_service, b"aws4_request");
    let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()));

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={access_key_id}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}"
    );

    SignedRequest {
        headers: vec![
            ("host".to_string(), host.to_string()),
            ("x-amz-date".to_string(), amz_date),
            ("x-amz-content-sha256".to_string(), payload_hash),
            ("authorization".to_string(), authorization),
        ],
    }
}

/// `YYYYMMDDTHHMMSSZ`, the format SigV4 requires for `x-amz-date`.
fn amz_date(at: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second(),
    )
}
