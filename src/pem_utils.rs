use crate::error::Result;

/// PEM label of an X.509 certificate.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(&pem, pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF))
}

/// Convert a PEM‑encoded string to DER‑encoded bytes, checking its label.
pub fn pem_to_der(pem_str: &str, label: &str) -> Result<Vec<u8>> {
    let pem = pem::parse(pem_str)?;
    if pem.tag() != label {
        return Err(crate::error::KmsCertError::MalformedEncoding(format!(
            "expected PEM label {label}, found {}",
            pem.tag()
        )));
    }
    Ok(pem.into_contents())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_with_certificate_header() {
        let pem = der_to_pem(&[0x30, 0x00], CERTIFICATE_LABEL);
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(pem.trim_end().ends_with("-----END CERTIFICATE-----"));
        assert_eq!(pem_to_der(&pem, CERTIFICATE_LABEL).unwrap(), vec![0x30, 0x00]);
    }

    #[test]
    fn rejects_other_labels() {
        let pem = der_to_pem(&[0x30, 0x00], "PUBLIC KEY");
        assert!(pem_to_der(&pem, CERTIFICATE_LABEL).is_err());
    }
}
