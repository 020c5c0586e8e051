use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{Any, Ia5StringRef, PrintableStringRef, SetOfVec, Utf8StringRef};
use der::{DateTime, Tag, Tagged};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

pub use crate::cert::extensions::ExtendedKeyUsageOption;
pub use crate::cert::extensions::{FlagSet, KeyUsages};
use crate::cert::SignatureAlgorithm;
use crate::error::{KmsCertError, Result};

const COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const ORGANIZATIONAL_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const STATE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// Everything needed to issue one certificate.
///
/// The caller fills in the identity fields. `serial_number`,
/// `subject_key_id` and `signature_algorithm` are stamped by
/// [`crate::kms::KmsSigner::create_certificate`] right before encoding.
///
/// # Fields
/// * `subject` - The distinguished name of the certificate subject.
/// * `dns_names` - DNS names placed in the Subject Alternative Name extension.
/// * `validity` - The `notBefore`/`notAfter` window.
/// * `key_usage` - Key usage flags; omitted from the certificate when empty.
/// * `ext_key_usage` - Extended key usages; omitted when empty.
/// * `basic_constraints_valid` - Whether to emit the Basic Constraints extension.
/// * `is_ca` - The `cA` flag of Basic Constraints.
#[derive(Clone, Debug, Builder)]
pub struct CertificateTemplate {
    #[builder(default)]
    pub subject: DistinguishedName,
    #[builder(default)]
    pub dns_names: Vec<String>,
    pub validity: Validity,
    #[builder(default)]
    pub key_usage: FlagSet<KeyUsages>,
    #[builder(default)]
    pub ext_key_usage: Vec<ExtendedKeyUsageOption>,
    #[builder(default)]
    pub basic_constraints_valid: bool,
    #[builder(default)]
    pub is_ca: bool,
    pub serial_number: Option<u128>,
    pub subject_key_id: Option<Vec<u8>>,
    pub signature_algorithm: Option<SignatureAlgorithm>,
}

/// Distinguished name parameters for building an X.509 certificate.
///
/// Only the attributes that are set end up in the encoded name.
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
}

impl DistinguishedName {
    /// Returns true when no attribute is set.
    pub fn is_empty(&self) -> bool {
        self == &DistinguishedName::default()
    }

    /// Converts the distinguished name to an X.509 name, one RDN per
    /// attribute. Values are PrintableStrings when the character set allows,
    /// UTF8Strings otherwise.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName> {
        let attributes = [
            (COUNTRY, &self.country),
            (ORGANIZATION, &self.organization),
            (ORGANIZATIONAL_UNIT, &self.organization_unit),
            (LOCALITY, &self.locality),
            (STATE, &self.state),
            (COMMON_NAME, &self.common_name),
        ];

        let mut rdns = Vec::new();
        for (oid, value) in attributes {
            let Some(value) = value else { continue };
            let tag = if PrintableStringRef::new(value).is_ok() {
                Tag::PrintableString
            } else {
                Tag::Utf8String
            };
            let value = Any::new(tag, value.as_bytes())?;
            let atv = AttributeTypeAndValue { oid, value };
            rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?));
        }
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509 name.
    ///
    /// Attributes this type does not model are ignored.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Result<Self> {
        let mut dn = DistinguishedName::default();

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let slot = match attr.oid {
                    COUNTRY => &mut dn.country,
                    ORGANIZATION => &mut dn.organization,
                    ORGANIZATIONAL_UNIT => &mut dn.organization_unit,
                    LOCALITY => &mut dn.locality,
                    STATE => &mut dn.state,
                    COMMON_NAME => &mut dn.common_name,
                    _ => continue,
                };
                *slot = Some(attribute_string(&attr.value)?);
            }
        }

        Ok(dn)
    }
}

fn attribute_string(value: &Any) -> Result<String> {
    let s = match value.tag() {
        Tag::Utf8String => value.decode_as::<Utf8StringRef<'_>>()?.as_str().to_string(),
        Tag::PrintableString => value
            .decode_as::<PrintableStringRef<'_>>()?
            .as_str()
            .to_string(),
        Tag::Ia5String => value.decode_as::<Ia5StringRef<'_>>()?.as_str().to_string(),
        other => {
            return Err(KmsCertError::MalformedEncoding(format!(
                "unsupported name attribute encoding {other}"
            )));
        }
    };
    Ok(s)
}

/// Certificate validity period.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    pub fn for_days(days: i64) -> Self {
        let now = now_seconds();
        Self {
            not_before: now,
            not_after: now + Duration::days(days),
        }
    }

    /// Creates a validity period starting now and ending at `not_after`.
    pub fn until(not_after: OffsetDateTime) -> Self {
        Self {
            not_before: now_seconds(),
            not_after,
        }
    }

    /// Lowers the window into its X.509 form: UTCTime before 2050,
    /// GeneralizedTime from 2050 on.
    pub fn to_x509_validity(&self) -> Result<x509_cert::time::Validity> {
        if self.not_after < self.not_before {
            return Err(KmsCertError::InputError(
                "validity ends before it starts".to_string(),
            ));
        }

        Ok(x509_cert::time::Validity {
            not_before: to_x509_time(self.not_before)?,
            not_after: to_x509_time(self.not_after)?,
        })
    }

    /// Reads a window back from its X.509 form.
    pub fn from_x509_validity(validity: &x509_cert::time::Validity) -> Self {
        Self {
            not_before: OffsetDateTime::from(validity.not_before.to_system_time()),
            not_after: OffsetDateTime::from(validity.not_after.to_system_time()),
        }
    }
}

// X.509 times have second precision.
fn now_seconds() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}

fn to_x509_time(t: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let t = t.to_offset(time::UtcOffset::UTC);
    let year = u16::try_from(t.year())
        .map_err(|_| KmsCertError::InputError(format!("time {t} out of range")))?;
    let date_time = DateTime::new(
        year,
        t.month().into(),
        t.day(),
        t.hour(),
        t.minute(),
        t.second(),
    )
    .map_err(|e| KmsCertError::InputError(format!("time {t} out of range: {e}")))?;

    let time = if t.year() < 2050 {
        x509_cert::time::Time::UtcTime(der::asn1::UtcTime::from_date_time(date_time)?)
    } else {
        x509_cert::time::Time::GeneralTime(der::asn1::GeneralizedTime::from_date_time(date_time))
    };
    Ok(time)
}
