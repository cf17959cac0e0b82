// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure helpers that turn loosely-shaped backend payloads into entity
//! observations.
//!
//! Two list shapes occur in the wild: pre-transformed offer lists (`flights`)
//! ready for display, and raw quote/RFQ lists (`quotes`) that must be
//! transformed locally. Pre-transformed lists are preferred when both are
//! present. Individual records that cannot be interpreted are skipped rather
//! than failing the whole batch.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::{OfferStatus, QuoteDetail, RfqFlight};

/// Extracts flight offers from a payload value.
///
/// Accepts a bare array, or an object carrying `flights` (preferred) or
/// `quotes`/`rfqs` (transformed locally). Returns an empty vec when the
/// payload carries no offer list.
pub fn offers_from_value(value: &Value) -> Vec<RfqFlight> {
    if let Some(items) = value.as_array() {
        return items.iter().filter_map(flight_from_value).collect();
    }

    if let Some(flights) = value.get("flights").and_then(Value::as_array) {
        return flights.iter().filter_map(flight_from_value).collect();
    }

    for key in ["quotes", "rfqs"] {
        if let Some(quotes) = value.get(key).and_then(Value::as_array) {
            return quotes.iter().filter_map(flight_from_quote_value).collect();
        }
    }

    Vec::new()
}

/// Interprets one pre-transformed offer record.
pub fn flight_from_value(value: &Value) -> Option<RfqFlight> {
    let id = string_field(value, &["id", "quoteId", "rfqId"])?;

    let price = number_field(value, &["price"]);
    let status = string_field(value, &["status"])
        .and_then(|s| OfferStatus::from_str(&s).ok())
        .unwrap_or_else(|| implied_status(price));

    Some(RfqFlight {
        id,
        operator: string_field(value, &["operator", "operatorName"]),
        aircraft_type: string_field(value, &["aircraftType", "aircraft"]),
        price,
        currency: string_field(value, &["currency"]),
        status: constrain_quoted(status, price),
        updated_at: timestamp_field(value, &["updatedAt", "lastUpdated"]),
        selected: false,
    })
}

/// Interprets one raw quote/RFQ record into an offer.
pub fn flight_from_quote_value(value: &Value) -> Option<RfqFlight> {
    let id = string_field(value, &["quoteId", "rfqId", "id"])?;

    let price = number_field(value, &["sellPrice", "price"])
        .or_else(|| value.get("price").and_then(|p| number_field(p, &["amount"])));
    let currency = string_field(value, &["currency"])
        .or_else(|| value.get("price").and_then(|p| string_field(p, &["currency"])));
    let operator = string_field(value, &["operatorName", "operator"])
        .or_else(|| value.get("operator").and_then(|o| string_field(o, &["name"])));
    let aircraft_type = string_field(value, &["aircraftType", "aircraft"])
        .or_else(|| value.get("aircraft").and_then(|a| string_field(a, &["model", "type"])));

    let status = string_field(value, &["status"])
        .and_then(|s| OfferStatus::from_str(&s).ok())
        .unwrap_or_else(|| implied_status(price));

    Some(RfqFlight {
        id,
        operator,
        aircraft_type,
        price,
        currency,
        status: constrain_quoted(status, price),
        updated_at: timestamp_field(value, &["updatedAt", "createdAt"]),
        selected: false,
    })
}

/// Extracts quote details from a payload carrying a `quoteDetails` object or
/// a `details` array.
pub fn quote_details_from_value(value: &Value) -> Vec<QuoteDetail> {
    if let Some(map) = value.get("quoteDetails").and_then(Value::as_object) {
        return map
            .iter()
            .map(|(quote_id, raw)| detail_from_value(quote_id.clone(), raw))
            .collect();
    }

    if let Some(items) = value.get("details").and_then(Value::as_array) {
        return items
            .iter()
            .filter_map(|raw| {
                let id = string_field(raw, &["quoteId", "id"])?;
                Some(detail_from_value(id, raw))
            })
            .collect();
    }

    Vec::new()
}

fn detail_from_value(quote_id: String, raw: &Value) -> QuoteDetail {
    let price = number_field(raw, &["sellPrice", "price", "totalPrice"])
        .or_else(|| raw.get("price").and_then(|p| number_field(p, &["amount"])));
    let currency = string_field(raw, &["currency"])
        .or_else(|| raw.get("price").and_then(|p| string_field(p, &["currency"])));
    QuoteDetail {
        quote_id,
        price,
        currency,
        raw: raw.clone(),
    }
}

/// A quoted status without a positive price is not trusted from the wire;
/// the record stays at `sent` until a real price is known.
fn constrain_quoted(status: OfferStatus, price: Option<f64>) -> OfferStatus {
    if status == OfferStatus::Quoted && !price.is_some_and(|p| p > 0.0) {
        OfferStatus::Sent
    } else {
        status
    }
}

fn implied_status(price: Option<f64>) -> OfferStatus {
    if price.is_some_and(|p| p > 0.0) {
        OfferStatus::Quoted
    } else {
        OfferStatus::Unanswered
    }
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

fn number_field(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| value.get(key).and_then(Value::as_f64))
}

fn timestamp_field(value: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_pretransformed_flights_over_raw_quotes() {
        let payload = json!({
            "flights": [{"id": "f-1", "operator": "JetCo", "price": 4000.0, "currency": "USD", "status": "quoted"}],
            "quotes": [{"quoteId": "q-9", "sellPrice": 1.0}]
        });
        let offers = offers_from_value(&payload);
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].id, "f-1");
        assert_eq!(offers[0].status, OfferStatus::Quoted);
    }

    #[test]
    fn falls_back_to_raw_quote_list() {
        let payload = json!({
            "quotes": [{
                "quoteId": "q-1",
                "operator": {"name": "AirOps"},
                "aircraft": {"model": "Citation XLS"},
                "price": {"amount": 12500.0, "currency": "EUR"},
                "status": "quoted"
            }]
        });
        let offers = offers_from_value(&payload);
        assert_eq!(offers.len(), 1);
        let offer = &offers[0];
        assert_eq!(offer.operator.as_deref(), Some("AirOps"));
        assert_eq!(offer.aircraft_type.as_deref(), Some("Citation XLS"));
        assert_eq!(offer.price, Some(12500.0));
        assert_eq!(offer.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn skips_records_without_identifiers() {
        let payload = json!({"flights": [{"operator": "NoId"}, {"id": "f-2"}]});
        let offers = offers_from_value(&payload);
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].id, "f-2");
    }

    #[test]
    fn quoted_without_price_is_demoted_to_sent() {
        let payload = json!({"flights": [{"id": "f-1", "status": "quoted"}]});
        let offers = offers_from_value(&payload);
        assert_eq!(offers[0].status, OfferStatus::Sent);
    }

    #[test]
    fn positive_price_implies_quoted_when_status_missing() {
        let payload = json!({"quotes": [{"quoteId": "q-1", "sellPrice": 900.0}]});
        let offers = offers_from_value(&payload);
        assert_eq!(offers[0].status, OfferStatus::Quoted);
    }

    #[test]
    fn no_offer_list_yields_empty() {
        assert!(offers_from_value(&json!({"type": "content"})).is_empty());
        assert!(offers_from_value(&json!(null)).is_empty());
    }

    #[test]
    fn quote_details_from_map_shape() {
        let payload = json!({
            "quoteDetails": {
                "q-1": {"sellPrice": 4000.0, "currency": "USD", "legs": 2}
            }
        });
        let details = quote_details_from_value(&payload);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].quote_id, "q-1");
        assert_eq!(details[0].price, Some(4000.0));
        assert_eq!(details[0].raw["legs"], 2);
    }

    #[test]
    fn quote_details_from_array_shape() {
        let payload = json!({
            "details": [{"quoteId": "q-2", "price": {"amount": 800.0, "currency": "GBP"}}]
        });
        let details = quote_details_from_value(&payload);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].currency.as_deref(), Some("GBP"));
    }
}
