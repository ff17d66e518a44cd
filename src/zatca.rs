//! ZATCA phase-1 simplified-invoice QR payload.
//!
//! The payload is five TLV fields (`tag byte, length byte, UTF-8 value`)
//! concatenated and base64-encoded, exactly the byte shape QR renderers and
//! the ZATCA validation apps expect:
//!
//! 1. seller name
//! 2. VAT registration number
//! 3. invoice timestamp (ISO-8601, UTC)
//! 4. invoice total with VAT
//! 5. VAT amount
//!
//! Rendering the QR image is the client's job; this module only produces
//! the encoded payload and the invoice hash stored alongside it.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::errors::ServiceError;

const TAG_SELLER_NAME: u8 = 1;
const TAG_VAT_NUMBER: u8 = 2;
const TAG_TIMESTAMP: u8 = 3;
const TAG_TOTAL_WITH_VAT: u8 = 4;
const TAG_VAT_AMOUNT: u8 = 5;

/// Invoice fields that feed the QR payload and the invoice hash.
#[derive(Debug, Clone)]
pub struct QrInvoiceData<'a> {
    pub seller_name: &'a str,
    pub vat_number: &'a str,
    pub issued_at: DateTime<Utc>,
    pub total_with_vat: Decimal,
    pub vat_amount: Decimal,
}

/// Build the base64 TLV payload for a simplified invoice.
pub fn qr_payload(data: &QrInvoiceData) -> Result<String, ServiceError> {
    let timestamp = data.issued_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let total = format_amount(data.total_with_vat);
    let vat = format_amount(data.vat_amount);

    let mut bytes = Vec::new();
    push_tlv(&mut bytes, TAG_SELLER_NAME, data.seller_name)?;
    push_tlv(&mut bytes, TAG_VAT_NUMBER, data.vat_number)?;
    push_tlv(&mut bytes, TAG_TIMESTAMP, &timestamp)?;
    push_tlv(&mut bytes, TAG_TOTAL_WITH_VAT, &total)?;
    push_tlv(&mut bytes, TAG_VAT_AMOUNT, &vat)?;

    Ok(general_purpose::STANDARD.encode(&bytes))
}

/// SHA-256 hex digest over the canonical invoice fields. Stable for a given
/// invoice, so a re-rendered PDF can be checked against the stored hash.
pub fn invoice_hash(invoice_number: &str, data: &QrInvoiceData) -> String {
    let canonical = format!(
        "{}|{}|{}|{}|{}|{}",
        invoice_number,
        data.seller_name,
        data.vat_number,
        data.issued_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        format_amount(data.total_with_vat),
        format_amount(data.vat_amount),
    );
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// ZATCA amounts carry exactly two decimal places.
fn format_amount(value: Decimal) -> String {
    format!("{:.2}", value)
}

fn push_tlv(out: &mut Vec<u8>, tag: u8, value: &str) -> Result<(), ServiceError> {
    let bytes = value.as_bytes();
    // One length byte per field; the phase-1 format has no extended form.
    let len = u8::try_from(bytes.len()).map_err(|_| {
        ServiceError::ValidationError(format!(
            "invoice field {tag} exceeds {} bytes",
            u8::MAX
        ))
    })?;
    out.push(tag);
    out.push(len);
    out.extend_from_slice(bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample() -> QrInvoiceData<'static> {
        QrInvoiceData {
            seller_name: "Najd Grill",
            vat_number: "310122393500003",
            issued_at: Utc.with_ymd_and_hms(2024, 3, 14, 18, 30, 0).unwrap(),
            total_with_vat: dec!(115.00),
            vat_amount: dec!(15.00),
        }
    }

    fn decode_tlv(payload: &str) -> Vec<(u8, String)> {
        let bytes = general_purpose::STANDARD.decode(payload).unwrap();
        let mut fields = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let tag = bytes[i];
            let len = bytes[i + 1] as usize;
            let value = String::from_utf8(bytes[i + 2..i + 2 + len].to_vec()).unwrap();
            fields.push((tag, value));
            i += 2 + len;
        }
        fields
    }

    #[test]
    fn payload_decodes_to_five_ordered_tags() {
        let payload = qr_payload(&sample()).unwrap();
        let fields = decode_tlv(&payload);

        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0], (1, "Najd Grill".to_string()));
        assert_eq!(fields[1], (2, "310122393500003".to_string()));
        assert_eq!(fields[2], (3, "2024-03-14T18:30:00Z".to_string()));
        assert_eq!(fields[3], (4, "115.00".to_string()));
        assert_eq!(fields[4], (5, "15.00".to_string()));
    }

    #[test]
    fn amounts_always_carry_two_decimals() {
        let mut data = sample();
        data.total_with_vat = dec!(100);
        data.vat_amount = dec!(13.0435);
        let fields = decode_tlv(&qr_payload(&data).unwrap());

        assert_eq!(fields[3].1, "100.00");
        assert_eq!(fields[4].1, "13.04");
    }

    #[test]
    fn arabic_seller_names_survive_the_byte_length_prefix() {
        let mut data = sample();
        data.seller_name = "مشويات نجد";
        let fields = decode_tlv(&qr_payload(&data).unwrap());

        assert_eq!(fields[0].1, "مشويات نجد");
    }

    #[test]
    fn oversized_field_is_rejected() {
        let name = "x".repeat(300);
        let mut data = sample();
        data.seller_name = &name;

        assert!(matches!(
            qr_payload(&data),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn invoice_hash_is_hex_and_tracks_its_inputs() {
        let data = sample();
        let a = invoice_hash("INV-1", &data);
        let b = invoice_hash("INV-1", &data);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));

        let mut changed = sample();
        changed.total_with_vat = dec!(120.00);
        assert_ne!(a, invoice_hash("INV-1", &changed));
        assert_ne!(a, invoice_hash("INV-2", &data));
    }
}
