//! Xero accounting API payload types (JSON deserialization)
//!
//! Field names follow the API's PascalCase. Scalars go through the
//! [`lenient`] deserializers, so a wrongly-typed or `null` value degrades
//! to its default instead of rejecting the record.
//!
//! See: <https://developer.xero.com/documentation/api/accounting/overview>

use chrono::NaiveDate;
use serde::Deserialize;

use ledgersync_core::domain::Shape;

/// A contact from `GET /Contacts`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct XeroContact {
    #[serde(rename = "ContactID", deserialize_with = "lenient::text")]
    pub contact_id: Option<String>,

    #[serde(deserialize_with = "lenient::text")]
    pub contact_status: Option<String>,

    #[serde(deserialize_with = "lenient::text")]
    pub name: Option<String>,

    #[serde(deserialize_with = "lenient::text")]
    pub email_address: Option<String>,

    #[serde(deserialize_with = "lenient::flag")]
    pub is_supplier: bool,

    #[serde(deserialize_with = "lenient::flag")]
    pub is_customer: bool,

    /// A list, a single object or a bare number string
    pub phones: Shape<PhoneEntry>,

    /// A list, a single object or a one-line string
    pub addresses: Shape<AddressEntry>,

    #[serde(deserialize_with = "lenient::list")]
    pub sales_tracking_categories: Vec<XeroTrackingCategory>,

    #[serde(deserialize_with = "lenient::list")]
    pub purchases_tracking_categories: Vec<XeroTrackingCategory>,
}

/// One element of a contact's `Phones`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PhoneEntry {
    Number(String),
    Detailed(XeroPhone),
    Other(serde::de::IgnoredAny),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct XeroPhone {
    #[serde(deserialize_with = "lenient::text")]
    pub phone_type: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub phone_number: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub phone_area_code: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub phone_country_code: Option<String>,
}

/// One element of a contact's `Addresses`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AddressEntry {
    Line(String),
    Detailed(XeroAddress),
    Other(serde::de::IgnoredAny),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct XeroAddress {
    #[serde(deserialize_with = "lenient::text")]
    pub address_type: Option<String>,
    #[serde(rename = "AddressLine1", deserialize_with = "lenient::text")]
    pub address_line1: Option<String>,
    #[serde(rename = "AddressLine2", deserialize_with = "lenient::text")]
    pub address_line2: Option<String>,
    #[serde(rename = "AddressLine3", deserialize_with = "lenient::text")]
    pub address_line3: Option<String>,
    #[serde(rename = "AddressLine4", deserialize_with = "lenient::text")]
    pub address_line4: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub city: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub region: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub postal_code: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct XeroTrackingCategory {
    #[serde(deserialize_with = "lenient::text")]
    pub tracking_category_name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub tracking_option_name: Option<String>,
}

/// The `Contact` reference embedded in invoices and bank transactions
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct XeroContactRef {
    #[serde(rename = "ContactID", deserialize_with = "lenient::text")]
    pub contact_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct XeroLineItem {
    #[serde(deserialize_with = "lenient::text")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient::amount")]
    pub quantity: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub unit_amount: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub line_amount: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub account_code: Option<String>,
}

/// An invoice from `GET /Invoices`
///
/// Xero sends each date twice: `Date` as a `/Date(ms±hhmm)/` token and
/// `DateString` as an ISO-8601 local date-time.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct XeroInvoice {
    #[serde(rename = "InvoiceID", deserialize_with = "lenient::text")]
    pub invoice_id: Option<String>,

    #[serde(deserialize_with = "lenient::text")]
    pub invoice_number: Option<String>,

    #[serde(deserialize_with = "lenient::text")]
    pub reference: Option<String>,

    #[serde(rename = "Type", deserialize_with = "lenient::text")]
    pub invoice_type: Option<String>,

    #[serde(deserialize_with = "lenient::text")]
    pub status: Option<String>,

    #[serde(deserialize_with = "lenient::record")]
    pub contact: Option<XeroContactRef>,

    #[serde(deserialize_with = "lenient::text")]
    pub currency_code: Option<String>,

    #[serde(deserialize_with = "lenient::amount")]
    pub sub_total: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub total_tax: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub total: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub total_discount: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub amount_due: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub amount_paid: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub amount_credited: f64,

    #[serde(deserialize_with = "lenient::date")]
    pub date_string: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient::date")]
    pub date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient::date")]
    pub due_date_string: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient::date")]
    pub due_date: Option<NaiveDate>,

    #[serde(deserialize_with = "lenient::list")]
    pub line_items: Vec<XeroLineItem>,
}

/// A bank transaction from `GET /BankTransactions`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct XeroBankTransaction {
    #[serde(rename = "BankTransactionID", deserialize_with = "lenient::text")]
    pub bank_transaction_id: Option<String>,

    /// `RECEIVE`, `SPEND`, or one of the transfer/prepayment variants
    #[serde(rename = "Type", deserialize_with = "lenient::text")]
    pub transaction_type: Option<String>,

    #[serde(deserialize_with = "lenient::record")]
    pub contact: Option<XeroContactRef>,

    #[serde(deserialize_with = "lenient::amount")]
    pub sub_total: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub total_tax: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub total: f64,

    #[serde(deserialize_with = "lenient::flag")]
    pub is_reconciled: bool,

    #[serde(deserialize_with = "lenient::text")]
    pub reference: Option<String>,

    #[serde(deserialize_with = "lenient::text")]
    pub currency_code: Option<String>,

    #[serde(deserialize_with = "lenient::date")]
    pub date_string: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient::date")]
    pub date: Option<NaiveDate>,

    #[serde(deserialize_with = "lenient::list")]
    pub line_items: Vec<XeroLineItem>,
}

/// Deserializers that coerce loosely-typed values instead of failing
///
/// - text: trimmed, empty is `None`, numbers are stringified
/// - flag: `true` or the string `"true"` (any case)
/// - amount: a number or numeric string (thousands commas allowed), else `0.0`
/// - date: ISO-8601 date or date-time, `/Date(ms±hhmm)/`, or epoch millis;
///   anything else is `None` plus a warning
/// - record / list: a value or list of values of the wrong shape is dropped
pub mod lenient {
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer};
    use serde_json::Number;
    use tracing::warn;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Number(Number),
        Bool(bool),
        Other(IgnoredAny),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose<T> {
        Value(T),
        Other(IgnoredAny),
    }

    impl<T> Loose<T> {
        fn into_option(self) -> Option<T> {
            match self {
                Loose::Value(value) => Some(value),
                Loose::Other(_) => None,
            }
        }
    }

    fn scalar<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Scalar>, D::Error> {
        Option::<Scalar>::deserialize(d)
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match scalar(d)? {
            Some(Scalar::Text(s)) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Some(Scalar::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match scalar(d)? {
            Some(Scalar::Bool(b)) => b,
            Some(Scalar::Text(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        })
    }

    pub fn amount<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        let amount = match scalar(d)? {
            Some(Scalar::Number(n)) => n.as_f64(),
            Some(Scalar::Text(s)) => s.trim().replace(',', "").parse::<f64>().ok(),
            _ => None,
        };
        Ok(amount.filter(|a| a.is_finite()).unwrap_or(0.0))
    }

    pub fn date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        Ok(match scalar(d)? {
            None => None,
            Some(Scalar::Text(s)) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(None);
                }
                let parsed = parse_date_str(s);
                if parsed.is_none() {
                    warn!(value = s, "Unparsable date, storing null");
                }
                parsed
            }
            Some(Scalar::Number(n)) => {
                let parsed = n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                    .map(|dt| dt.date_naive());
                if parsed.is_none() {
                    warn!(value = %n, "Out-of-range timestamp, storing null");
                }
                parsed
            }
            Some(Scalar::Bool(_) | Scalar::Other(_)) => {
                warn!("Unsupported date value, storing null");
                None
            }
        })
    }

    /// A nested object, or `None` when the value has another shape
    pub fn record<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Ok(Option::<Loose<T>>::deserialize(d)?.and_then(Loose::into_option))
    }

    /// Elements of a list that have the expected shape; anything that is
    /// not a list is empty
    pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Ok(Option::<Loose<Vec<Loose<T>>>>::deserialize(d)?
            .and_then(Loose::into_option)
            .unwrap_or_default()
            .into_iter()
            .filter_map(Loose::into_option)
            .collect())
    }

    fn parse_date_str(s: &str) -> Option<NaiveDate> {
        if let Some(date) = parse_ms_date_token(s) {
            return Some(date);
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(date);
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.date_naive());
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(dt.date());
            }
        }
        None
    }

    /// Parses `/Date(1518685950940+1300)/`
    ///
    /// The offset selects the calendar day the timestamp falls on in that
    /// zone; without an offset the day is taken in UTC.
    fn parse_ms_date_token(s: &str) -> Option<NaiveDate> {
        let inner = s.strip_prefix("/Date(")?.strip_suffix(")/")?;

        // Skip a leading sign on the millis before looking for the offset sign.
        let split = inner
            .char_indices()
            .skip(1)
            .find(|(_, c)| *c == '+' || *c == '-')
            .map(|(i, _)| i);
        let (millis, offset) = match split {
            Some(i) => (&inner[..i], Some(&inner[i..])),
            None => (inner, None),
        };

        let millis: i64 = millis.parse().ok()?;
        let utc = Utc.timestamp_millis_opt(millis).single()?;

        let offset_secs = match offset {
            None => 0,
            Some(o) => {
                let sign = if o.starts_with('-') { -1 } else { 1 };
                let digits = &o[1..];
                if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                let hours: i32 = digits[..2].parse().ok()?;
                let minutes: i32 = digits[2..].parse().ok()?;
                sign * (hours * 3600 + minutes * 60)
            }
        };
        let zone = FixedOffset::east_opt(offset_secs)?;
        Some(utc.with_timezone(&zone).date_naive())
    }
}
