//! Alert fan-out. One alert goes to the chat webhook and to every opted-in
//! subscriber on both channels. Attempts are independent and best-effort:
//! a failed send is recorded and logged, never propagated and never retried,
//! so an alert is dispatched at most once per qualifying ping.

use std::sync::Arc;

use gamewatch_db::{Alert, Channel, Database};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::outbound::{Outbound, OutboundError};

/// Where a delivery attempt was aimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Webhook,
    Direct { phone: String, channel: Channel },
}

/// Outcome of one delivery attempt.
#[derive(Debug)]
pub struct DeliveryOutcome {
    pub target: Target,
    pub result: Result<(), OutboundError>,
}

/// Every attempt made for one alert, with its individual outcome.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    db: Database,
    outbound: Arc<dyn Outbound>,
}

impl Dispatcher {
    pub fn new(db: Database, outbound: Arc<dyn Outbound>) -> Self {
        Self { db, outbound }
    }

    /// Fan one alert out to the webhook and all opted-in subscribers.
    pub async fn dispatch(&self, alert: &Alert) -> DispatchReport {
        let text = alert.render();
        let mut report = DispatchReport::default();

        // Webhook goes out before the subscriber sends start.
        let result = self.outbound.send_chat(&text).await;
        if let Err(e) = &result {
            error!(error = %e, "webhook delivery failed");
        }
        report.outcomes.push(DeliveryOutcome {
            target: Target::Webhook,
            result,
        });

        // Subscriber sends run concurrently; recipients are independent and
        // no ordering is guaranteed between them.
        let mut tasks = JoinSet::new();
        for channel in [Channel::Sms, Channel::Whatsapp] {
            let subscribers = match self.db.opted_in_subscribers(channel).await {
                Ok(subscribers) => subscribers,
                Err(e) => {
                    error!(error = %e, %channel, "could not load subscriber list");
                    continue;
                }
            };
            for subscriber in subscribers {
                let outbound = Arc::clone(&self.outbound);
                let text = text.clone();
                tasks.spawn(async move {
                    let result = outbound
                        .send_direct(&subscriber.phone, subscriber.channel, &text)
                        .await;
                    DeliveryOutcome {
                        target: Target::Direct {
                            phone: subscriber.phone,
                            channel: subscriber.channel,
                        },
                        result,
                    }
                });
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    if let Err(e) = &outcome.result {
                        error!(error = %e, ?outcome.target, "direct delivery failed");
                    }
                    report.outcomes.push(outcome);
                }
                Err(e) => error!(error = %e, "delivery task panicked"),
            }
        }

        info!(
            delivered = report.delivered(),
            failed = report.failed(),
            "dispatched alert"
        );
        report
    }

    /// Reply to an inbound subscriber message on the channel it arrived on.
    /// Best-effort, same as alert delivery.
    pub async fn reply(&self, phone: &str, channel: Channel, text: &str) {
        if let Err(e) = self.outbound.send_direct(phone, channel, text).await {
            error!(error = %e, %channel, "reply delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every send; fails for phones listed in `failing`.
    struct RecordingOutbound {
        sent: Mutex<Vec<(Target, String)>>,
        failing: Vec<String>,
    }

    impl RecordingOutbound {
        fn new(failing: Vec<String>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                failing,
            }
        }
    }

    #[async_trait]
    impl Outbound for RecordingOutbound {
        async fn send_chat(&self, text: &str) -> Result<(), OutboundError> {
            self.sent
                .lock()
                .unwrap()
                .push((Target::Webhook, text.to_string()));
            Ok(())
        }

        async fn send_direct(
            &self,
            phone: &str,
            channel: Channel,
            text: &str,
        ) -> Result<(), OutboundError> {
            self.sent.lock().unwrap().push((
                Target::Direct {
                    phone: phone.to_string(),
                    channel,
                },
                text.to_string(),
            ));
            if self.failing.iter().any(|p| p == phone) {
                return Err(OutboundError::ProviderStatus(500));
            }
            Ok(())
        }
    }

    const T0: i64 = 1700000000;

    #[tokio::test]
    async fn test_fan_out_reaches_webhook_and_all_subscribers() {
        let db = Database::open_in_memory().await.unwrap();
        db.upsert_subscriber("+15551230001".to_string(), Channel::Sms, true, T0)
            .await
            .unwrap();
        db.upsert_subscriber("+15551230002".to_string(), Channel::Whatsapp, true, T0)
            .await
            .unwrap();

        let outbound = Arc::new(RecordingOutbound::new(Vec::new()));
        let dispatcher = Dispatcher::new(db, Arc::clone(&outbound) as Arc<dyn Outbound>);

        let alert = Alert::LastPlayerLeft {
            game: "5 Card Stud".to_string(),
        };
        let report = dispatcher.dispatch(&alert).await;

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.delivered(), 3);
        assert_eq!(report.failed(), 0);

        let sent = outbound.sent.lock().unwrap();
        assert!(sent.iter().all(|(_, text)| text == &alert.render()));
        assert!(sent.iter().any(|(target, _)| *target == Target::Webhook));
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_the_rest() {
        let db = Database::open_in_memory().await.unwrap();
        db.upsert_subscriber("+15551230001".to_string(), Channel::Sms, true, T0)
            .await
            .unwrap();
        db.upsert_subscriber("+15551230002".to_string(), Channel::Sms, true, T0)
            .await
            .unwrap();
        db.upsert_subscriber("+15551230003".to_string(), Channel::Whatsapp, true, T0)
            .await
            .unwrap();

        let outbound = Arc::new(RecordingOutbound::new(vec!["+15551230001".to_string()]));
        let dispatcher = Dispatcher::new(db, Arc::clone(&outbound) as Arc<dyn Outbound>);

        let alert = Alert::DailyHeartbeat {
            game: "5 Card Stud".to_string(),
        };
        let report = dispatcher.dispatch(&alert).await;

        // Webhook + three subscribers attempted, exactly one failed.
        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.delivered(), 3);

        // The failing attempt is attributable.
        let failed = report
            .outcomes
            .iter()
            .find(|o| o.result.is_err())
            .unwrap();
        assert_eq!(
            failed.target,
            Target::Direct {
                phone: "+15551230001".to_string(),
                channel: Channel::Sms,
            }
        );

        // All four sends were actually attempted.
        assert_eq!(outbound.sent.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_opted_out_subscribers_are_skipped() {
        let db = Database::open_in_memory().await.unwrap();
        db.upsert_subscriber("+15551230001".to_string(), Channel::Sms, false, T0)
            .await
            .unwrap();

        let outbound = Arc::new(RecordingOutbound::new(Vec::new()));
        let dispatcher = Dispatcher::new(db, Arc::clone(&outbound) as Arc<dyn Outbound>);

        let alert = Alert::ServerDeleted {
            server_url: "http://poker.example.com/?table=stud5".to_string(),
        };
        let report = dispatcher.dispatch(&alert).await;

        // Webhook only.
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].target, Target::Webhook);
    }
}
