// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entity merge for flight offers.
//!
//! Pure functions: given an existing collection and a new observation batch,
//! produce the merged collection plus a report of what changed. Offers join
//! on id; fields update only where the new data is present; status moves by
//! informativeness rank and never regresses. `quoted` is only accepted once a
//! positive price is known.

use std::collections::HashMap;

use rfqsync_core::types::{OfferStatus, QuoteDetail, RfqFlight};

/// One observed status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    pub offer_id: String,
    pub from: OfferStatus,
    pub to: OfferStatus,
}

/// What a merge changed, used to fire notifications.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Offers present only in the new batch, appended.
    pub appended: Vec<String>,
    /// Offers that became `quoted` in this merge (appended or transitioned).
    pub newly_quoted: Vec<String>,
    /// Every status change, one entry per offer.
    pub transitions: Vec<StatusTransition>,
}

impl MergeReport {
    pub fn is_empty(&self) -> bool {
        self.appended.is_empty() && self.newly_quoted.is_empty() && self.transitions.is_empty()
    }

    fn absorb(&mut self, other: MergeReport) {
        self.appended.extend(other.appended);
        self.newly_quoted.extend(other.newly_quoted);
        self.transitions.extend(other.transitions);
    }
}

/// Merges a new batch of offers into the existing collection.
///
/// Offers only in the batch are appended; offers present in both are updated
/// field-by-field with the new data only where present. Ordering of existing
/// offers is preserved; new offers append in batch order. The local
/// `selected` flag is never overwritten by ingested data.
pub fn merge_offers(existing: &[RfqFlight], incoming: &[RfqFlight]) -> (Vec<RfqFlight>, MergeReport) {
    let mut merged = existing.to_vec();
    let mut report = MergeReport::default();

    for new in incoming {
        match merged.iter_mut().find(|offer| offer.id == new.id) {
            Some(current) => {
                let from = current.status;

                if new.operator.is_some() {
                    current.operator = new.operator.clone();
                }
                if new.aircraft_type.is_some() {
                    current.aircraft_type = new.aircraft_type.clone();
                }
                if new.price.is_some() {
                    current.price = new.price;
                }
                if new.currency.is_some() {
                    current.currency = new.currency.clone();
                }
                if new.updated_at.is_some() {
                    current.updated_at = new.updated_at;
                }

                let to = next_status(from, new.status, current.has_price());
                if to != from {
                    current.status = to;
                    if to == OfferStatus::Quoted {
                        report.newly_quoted.push(current.id.clone());
                    }
                    report.transitions.push(StatusTransition {
                        offer_id: current.id.clone(),
                        from,
                        to,
                    });
                }
            }
            None => {
                let mut offer = new.clone();
                if offer.status == OfferStatus::Quoted && !offer.has_price() {
                    offer.status = OfferStatus::Sent;
                }
                if offer.status == OfferStatus::Quoted {
                    report.newly_quoted.push(offer.id.clone());
                }
                report.appended.push(offer.id.clone());
                merged.push(offer);
            }
        }
    }

    (merged, report)
}

/// Monotonic status step: the candidate is adopted only when it is at least
/// as informative as the current status, and `quoted` only once a positive
/// price is known. Equal rank is last-write-wins.
fn next_status(current: OfferStatus, candidate: OfferStatus, price_known: bool) -> OfferStatus {
    if candidate == OfferStatus::Quoted && !price_known {
        return current;
    }
    if candidate.rank() < current.rank() {
        return current;
    }
    candidate
}

/// Refreshes offers in place from quote-detail lookups.
///
/// When a detail carries a positive price for an offer already in the
/// collection, that offer's price and currency are updated and a still-open
/// status (`unanswered`/`sent`) is upgraded to `quoted`.
pub fn apply_quote_details(
    offers: &mut [RfqFlight],
    details: &HashMap<String, QuoteDetail>,
) -> MergeReport {
    let mut report = MergeReport::default();

    for offer in offers.iter_mut() {
        let Some(detail) = details.get(&offer.id) else {
            continue;
        };
        let Some(price) = detail.price.filter(|p| *p > 0.0) else {
            continue;
        };

        offer.price = Some(price);
        if detail.currency.is_some() {
            offer.currency = detail.currency.clone();
        }

        if matches!(offer.status, OfferStatus::Unanswered | OfferStatus::Sent) {
            let from = offer.status;
            offer.status = OfferStatus::Quoted;
            report.newly_quoted.push(offer.id.clone());
            report.transitions.push(StatusTransition {
                offer_id: offer.id.clone(),
                from,
                to: OfferStatus::Quoted,
            });
        }
    }

    report
}

/// Convenience: merge a batch and then apply details in one step.
pub fn merge_with_details(
    existing: &[RfqFlight],
    incoming: &[RfqFlight],
    details: &HashMap<String, QuoteDetail>,
) -> (Vec<RfqFlight>, MergeReport) {
    let (mut merged, mut report) = merge_offers(existing, incoming);
    report.absorb(apply_quote_details(&mut merged, details));
    (merged, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn offer(id: &str, status: OfferStatus, price: Option<f64>) -> RfqFlight {
        RfqFlight {
            price,
            status,
            ..RfqFlight::new(id)
        }
    }

    #[test]
    fn appends_offers_only_in_new_batch() {
        let existing = vec![offer("q-1", OfferStatus::Sent, None)];
        let incoming = vec![offer("q-2", OfferStatus::Unanswered, None)];

        let (merged, report) = merge_offers(&existing, &incoming);
        assert_eq!(merged.len(), 2);
        assert_eq!(report.appended, vec!["q-2".to_string()]);
        assert!(report.transitions.is_empty());
    }

    #[test]
    fn updates_fields_only_where_present() {
        let mut existing = offer("q-1", OfferStatus::Sent, None);
        existing.operator = Some("JetCo".into());
        existing.aircraft_type = Some("Citation XLS".into());

        let incoming = RfqFlight {
            price: Some(4000.0),
            currency: Some("USD".into()),
            status: OfferStatus::Quoted,
            ..RfqFlight::new("q-1")
        };

        let (merged, report) = merge_offers(&[existing], &[incoming]);
        let updated = &merged[0];
        // Absent fields keep the known values.
        assert_eq!(updated.operator.as_deref(), Some("JetCo"));
        assert_eq!(updated.aircraft_type.as_deref(), Some("Citation XLS"));
        // Present fields are taken from the batch.
        assert_eq!(updated.price, Some(4000.0));
        assert_eq!(updated.status, OfferStatus::Quoted);
        assert_eq!(report.newly_quoted, vec!["q-1".to_string()]);
        assert_eq!(report.transitions.len(), 1);
    }

    #[test]
    fn status_never_regresses_from_quoted() {
        let existing = vec![offer("q-1", OfferStatus::Quoted, Some(4000.0))];
        let incoming = vec![offer("q-1", OfferStatus::Unanswered, None)];

        let (merged, report) = merge_offers(&existing, &incoming);
        assert_eq!(merged[0].status, OfferStatus::Quoted);
        assert!(report.transitions.is_empty());
    }

    #[test]
    fn quoted_without_price_is_not_adopted() {
        let existing = vec![offer("q-1", OfferStatus::Sent, None)];
        let incoming = vec![offer("q-1", OfferStatus::Quoted, None)];

        let (merged, _) = merge_offers(&existing, &incoming);
        assert_eq!(merged[0].status, OfferStatus::Sent);
    }

    #[test]
    fn quoted_with_previously_known_price_is_adopted() {
        // The price arrived earlier; a bare status flip to quoted is valid.
        let existing = vec![offer("q-1", OfferStatus::Sent, Some(900.0))];
        let incoming = vec![offer("q-1", OfferStatus::Quoted, None)];

        let (merged, report) = merge_offers(&existing, &incoming);
        assert_eq!(merged[0].status, OfferStatus::Quoted);
        assert_eq!(report.newly_quoted, vec!["q-1".to_string()]);
    }

    #[test]
    fn new_offer_claiming_quoted_without_price_is_demoted() {
        let (merged, report) = merge_offers(&[], &[offer("q-1", OfferStatus::Quoted, None)]);
        assert_eq!(merged[0].status, OfferStatus::Sent);
        assert!(report.newly_quoted.is_empty());
    }

    #[test]
    fn equal_rank_is_last_write_wins() {
        let existing = vec![offer("q-1", OfferStatus::Quoted, Some(4000.0))];
        let incoming = vec![offer("q-1", OfferStatus::Declined, None)];

        let (merged, report) = merge_offers(&existing, &incoming);
        assert_eq!(merged[0].status, OfferStatus::Declined);
        assert_eq!(report.transitions.len(), 1);
    }

    #[test]
    fn selection_flag_survives_merge() {
        let mut existing = offer("q-1", OfferStatus::Quoted, Some(4000.0));
        existing.selected = true;

        let incoming = offer("q-1", OfferStatus::Quoted, Some(4200.0));
        let (merged, _) = merge_offers(&[existing], &[incoming]);
        assert!(merged[0].selected);
    }

    #[test]
    fn poll_scenario_one_offer_quoted() {
        // Two unanswered offers; a poll returns one now quoted at 4000 USD.
        let existing = vec![
            offer("q-1", OfferStatus::Unanswered, None),
            offer("q-2", OfferStatus::Unanswered, None),
        ];
        let incoming = vec![RfqFlight {
            price: Some(4000.0),
            currency: Some("USD".into()),
            status: OfferStatus::Quoted,
            ..RfqFlight::new("q-1")
        }];

        let (merged, report) = merge_offers(&existing, &incoming);
        assert_eq!(merged.len(), 2);
        assert_eq!(report.newly_quoted, vec!["q-1".to_string()]);
        assert_eq!(report.transitions.len(), 1);
        assert_eq!(merged.iter().find(|o| o.id == "q-2").unwrap().status, OfferStatus::Unanswered);
    }

    #[test]
    fn details_refresh_price_and_upgrade_status() {
        let mut offers = vec![offer("q-1", OfferStatus::Sent, None)];
        let details = HashMap::from([(
            "q-1".to_string(),
            QuoteDetail {
                quote_id: "q-1".into(),
                price: Some(880.0),
                currency: Some("EUR".into()),
                raw: json!({}),
            },
        )]);

        let report = apply_quote_details(&mut offers, &details);
        assert_eq!(offers[0].price, Some(880.0));
        assert_eq!(offers[0].status, OfferStatus::Quoted);
        assert_eq!(report.newly_quoted, vec!["q-1".to_string()]);
    }

    #[test]
    fn details_without_price_change_nothing() {
        let mut offers = vec![offer("q-1", OfferStatus::Sent, None)];
        let details = HashMap::from([(
            "q-1".to_string(),
            QuoteDetail {
                quote_id: "q-1".into(),
                price: None,
                currency: None,
                raw: json!({"note": "pending"}),
            },
        )]);

        let report = apply_quote_details(&mut offers, &details);
        assert!(report.is_empty());
        assert_eq!(offers[0].status, OfferStatus::Sent);
    }

    #[test]
    fn details_do_not_downgrade_terminal_statuses() {
        let mut offers = vec![offer("q-1", OfferStatus::Declined, None)];
        let details = HashMap::from([(
            "q-1".to_string(),
            QuoteDetail {
                quote_id: "q-1".into(),
                price: Some(700.0),
                currency: None,
                raw: json!({}),
            },
        )]);

        apply_quote_details(&mut offers, &details);
        assert_eq!(offers[0].status, OfferStatus::Declined);
        // The price is still recorded for display.
        assert_eq!(offers[0].price, Some(700.0));
    }

    proptest! {
        /// For all sequences of merge operations, an offer that has reached
        /// `quoted` never drops back to `unanswered`/`sent`.
        #[test]
        fn quoted_status_is_monotonic(batches in proptest::collection::vec(
            proptest::collection::vec(
                (0u8..4, proptest::option::of(0.0f64..10_000.0), 0u8..5),
                0..4,
            ),
            1..8,
        )) {
            let mut offers: Vec<RfqFlight> = Vec::new();
            let mut quoted_seen: std::collections::HashSet<String> = std::collections::HashSet::new();

            for batch in batches {
                let incoming: Vec<RfqFlight> = batch
                    .into_iter()
                    .map(|(id, price, status)| RfqFlight {
                        price,
                        status: match status {
                            0 => OfferStatus::Unanswered,
                            1 => OfferStatus::Sent,
                            2 => OfferStatus::Quoted,
                            3 => OfferStatus::Declined,
                            _ => OfferStatus::Expired,
                        },
                        ..RfqFlight::new(format!("q-{id}"))
                    })
                    .collect();

                let (merged, _) = merge_offers(&offers, &incoming);
                offers = merged;

                for offer in &offers {
                    if quoted_seen.contains(&offer.id) {
                        prop_assert!(
                            offer.status.rank() >= OfferStatus::Quoted.rank(),
                            "offer {} regressed to {:?}",
                            offer.id,
                            offer.status
                        );
                    }
                    if offer.status == OfferStatus::Quoted {
                        quoted_seen.insert(offer.id.clone());
                    }
                }
            }
        }
    }
}
