use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Barrier;
use uuid::Uuid;

use voya_domain::catalog::{Bus, SeatCatalog};
use voya_domain::clock::SystemClock;
use voya_domain::ReservationError;
use voya_reservation::seats::HoldSeatsRequest;
use voya_reservation::{HoldPolicy, MemoryLedger, SeatReservationManager};

struct OneBusCatalog {
    bus: Bus,
}

#[async_trait]
impl SeatCatalog for OneBusCatalog {
    async fn bus(
        &self,
        bus_id: Uuid,
    ) -> Result<Option<Bus>, Box<dyn std::error::Error + Send + Sync>> {
        Ok((bus_id == self.bus.id).then(|| self.bus.clone()))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_holds_grant_exactly_one() {
    let bus_id = Uuid::new_v4();
    let manager = Arc::new(SeatReservationManager::new(
        Arc::new(MemoryLedger::new()),
        Arc::new(OneBusCatalog {
            bus: Bus {
                id: bus_id,
                name: "Express".to_string(),
                capacity: 40,
            },
        }),
        HoldPolicy::default(),
        Arc::new(SystemClock),
    ));

    let contenders = 16;
    let barrier = Arc::new(Barrier::new(contenders));
    let journey_date = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();

    let mut handles = Vec::new();
    for i in 0..contenders {
        let manager = manager.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            manager
                .hold_seats(HoldSeatsRequest {
                    bus_id,
                    journey_date,
                    seat_numbers: vec!["7".to_string()],
                    hold_token: None,
                    user_id: format!("user-{}", i),
                    trip_id: Uuid::new_v4(),
                })
                .await
        }));
    }

    let mut granted = 0;
    let mut conflicted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(grant) => {
                assert_eq!(grant.held, vec!["7"]);
                granted += 1;
            }
            Err(ReservationError::Conflict(report)) => {
                assert_eq!(report.rejections.len(), 1);
                conflicted += 1;
            }
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(granted, 1);
    assert_eq!(conflicted, contenders - 1);
}
