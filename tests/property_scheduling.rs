//! Property tests for request selection within a test group.

mod common;

use buildbot_sync::domain::models::BuildRequestStatus;
use common::{dashboard, farm, forced, request, triggerable, TESTER};
use proptest::prelude::*;

fn status() -> impl Strategy<Value = BuildRequestStatus> {
    prop_oneof![
        Just(BuildRequestStatus::Pending),
        Just(BuildRequestStatus::Scheduled),
        Just(BuildRequestStatus::Running),
        Just(BuildRequestStatus::Completed),
        Just(BuildRequestStatus::Failed),
        Just(BuildRequestStatus::Canceled),
    ]
}

proptest! {
    /// Property: with an idle tester and nothing running remotely, exactly
    /// the first pending test of the group is submitted, and every request
    /// the dashboard believed in flight is failed.
    #[test]
    fn prop_first_pending_test_is_submitted(statuses in prop::collection::vec(status(), 1..8)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let requests: Vec<_> = statuses
            .iter()
            .zip(0_i32..)
            .map(|(status, order)| request(700 + u64::try_from(order).unwrap(), 1, order, *status))
            .collect();
        let expected = requests
            .iter()
            .find(|request| request.status == BuildRequestStatus::Pending)
            .map(|request| (TESTER.to_string(), request.id.to_string()));

        let farm = farm();
        let dashboard = dashboard(requests.clone());
        let report = runtime.block_on(async {
            let mut triggerable = triggerable(&farm, &dashboard).await;
            triggerable.sync_once().await.unwrap()
        });

        prop_assert_eq!(forced(&farm), expected.into_iter().collect::<Vec<_>>());
        for request in &requests {
            if matches!(request.status, BuildRequestStatus::Scheduled | BuildRequestStatus::Running) {
                prop_assert_eq!(report.status_of(request.id), Some(BuildRequestStatus::Failed));
            }
        }
    }

    /// Property: a second pass over an unchanged world submits nothing.
    #[test]
    fn prop_second_pass_is_quiet(pending in 1usize..6) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let requests: Vec<_> = (0..pending)
            .map(|order| {
                let order = i32::try_from(order).unwrap();
                request(700 + u64::try_from(order).unwrap(), 1, order, BuildRequestStatus::Pending)
            })
            .collect();

        let farm = farm();
        let dashboard = dashboard(requests);
        let second = runtime.block_on(async {
            let mut triggerable = triggerable(&farm, &dashboard).await;
            triggerable.sync_once().await.unwrap();
            triggerable.sync_once().await.unwrap()
        });

        prop_assert!(second.submitted.is_empty());
        prop_assert_eq!(forced(&farm).len(), 1);
    }
}
