//! Deposit eligibility checks over the full stack: campaign lookup, live
//! snapshot read, then the ordered rejection rules.

mod common;

use common::{
    buyer_payload, live_draft, status_payload, Harness, NETWORK_ID, USDT_CONTRACT,
};
use presale_engine::engine::DepositRequest;
use presale_engine::storage::{CampaignInclude, CampaignStore};
use presale_engine::types::{AccessType, Currency, DepositVerdict, ErrorCode};

const PRESALE: &str = "0xaaaa00000000000000000000000000000000aaaa";
const DEPOSITOR: &str = "0x2222222222222222222222222222222222222222";

fn request(token_amount: &str, native_amount: &str) -> DepositRequest {
    DepositRequest {
        depositor: DEPOSITOR.to_string(),
        token_amount: token_amount.to_string(),
        native_amount: native_amount.to_string(),
    }
}

#[tokio::test]
async fn unknown_presale_contract_is_rejected() {
    let harness = Harness::new().await;

    let result = harness
        .eligibility
        .authorize_deposit(PRESALE, NETWORK_ID, &request("1000000", "0"))
        .await;

    assert_eq!(result.error_code(), Some(ErrorCode::ProjectNotFound));
}

#[tokio::test]
async fn hard_cap_reached_rejects_any_deposit() {
    let harness = Harness::new().await;
    let mut draft = live_draft(PRESALE, Currency::Usdt);
    draft.hard_cap = "100".parse().unwrap();
    harness.store.create_campaign(&draft, &[]).await.unwrap();

    // 100 USDT collected at 6 decimals: exactly the hard cap.
    harness
        .chain
        .set_response(PRESALE, "STATUS", status_payload("100000000", 40));

    let verdict = harness
        .eligibility
        .authorize_deposit(PRESALE, NETWORK_ID, &request("1", "0"))
        .await
        .into_result()
        .unwrap();

    assert_eq!(verdict, DepositVerdict::Reject(ErrorCode::AllTokenSoldOut));
}

#[tokio::test]
async fn allocation_limit_counts_existing_deposits() {
    let harness = Harness::new().await;
    let mut draft = live_draft(PRESALE, Currency::Usdt);
    draft.max_allocation_wallet = Some("10".parse().unwrap());
    harness.store.create_campaign(&draft, &[]).await.unwrap();

    harness
        .chain
        .set_response(PRESALE, "STATUS", status_payload("50000000", 3));
    // Wallet already deposited 8 USDT; 8 + 3 > 10.
    harness
        .chain
        .set_response(PRESALE, "BUYERS", buyer_payload("8000000"));

    let verdict = harness
        .eligibility
        .authorize_deposit(PRESALE, NETWORK_ID, &request("3000000", "0"))
        .await
        .into_result()
        .unwrap();

    assert_eq!(verdict, DepositVerdict::Reject(ErrorCode::AllocationExceeded));
}

#[tokio::test]
async fn allocation_limit_uses_native_amount_for_native_sales() {
    let harness = Harness::new().await;
    let mut draft = live_draft(PRESALE, Currency::Eth);
    draft.max_allocation_wallet = Some("10".parse().unwrap());
    harness.store.create_campaign(&draft, &[]).await.unwrap();

    harness
        .chain
        .set_response(PRESALE, "STATUS", status_payload("5000000000000000000", 3));
    harness
        .chain
        .set_response(PRESALE, "BUYERS", buyer_payload("8000000000000000000"));

    let verdict = harness
        .eligibility
        .authorize_deposit(PRESALE, NETWORK_ID, &request("0", "3"))
        .await
        .into_result()
        .unwrap();

    assert_eq!(verdict, DepositVerdict::Reject(ErrorCode::AllocationExceeded));
}

#[tokio::test]
async fn private_campaign_rejects_unlisted_wallet_regardless_of_amount() {
    let harness = Harness::new().await;
    let mut draft = live_draft(PRESALE, Currency::Eth);
    draft.access_type = AccessType::Private;
    harness
        .store
        .create_campaign(
            &draft,
            &["0x3333333333333333333333333333333333333333".to_string()],
        )
        .await
        .unwrap();

    harness
        .chain
        .set_response(PRESALE, "STATUS", status_payload("0", 0));

    for native_amount in ["0", "0.0001", "999"] {
        let verdict = harness
            .eligibility
            .authorize_deposit(PRESALE, NETWORK_ID, &request("0", native_amount))
            .await
            .into_result()
            .unwrap();
        assert_eq!(verdict, DepositVerdict::Reject(ErrorCode::NotWhitelisted));
    }
}

#[tokio::test]
async fn whitelist_match_is_case_insensitive() {
    let harness = Harness::new().await;
    let mut draft = live_draft(PRESALE, Currency::Eth);
    draft.access_type = AccessType::Private;
    // Stored checksummed, presented lowercase.
    harness
        .store
        .create_campaign(
            &draft,
            &["0xAbCdEf0123456789aBcDeF0123456789abcdef01".to_string()],
        )
        .await
        .unwrap();

    harness
        .chain
        .set_response(PRESALE, "STATUS", status_payload("0", 0));

    let lowercase_request = DepositRequest {
        depositor: "0xabcdef0123456789abcdef0123456789abcdef01".to_string(),
        token_amount: "0".to_string(),
        native_amount: "1".to_string(),
    };
    let verdict = harness
        .eligibility
        .authorize_deposit(PRESALE, NETWORK_ID, &lowercase_request)
        .await
        .into_result()
        .unwrap();

    assert_eq!(verdict, DepositVerdict::Allow);
}

#[tokio::test]
async fn stablecoin_deposit_needs_wallet_balance() {
    let harness = Harness::new().await;
    let draft = live_draft(PRESALE, Currency::Usdt);
    harness.store.create_campaign(&draft, &[]).await.unwrap();

    harness
        .chain
        .set_response(PRESALE, "STATUS", status_payload("0", 0));
    harness
        .chain
        .set_response(USDT_CONTRACT, "balanceOf", serde_json::json!("1000000"));

    // Wants 5 USDT, holds 1.
    let verdict = harness
        .eligibility
        .authorize_deposit(PRESALE, NETWORK_ID, &request("5000000", "0"))
        .await
        .into_result()
        .unwrap();
    assert_eq!(verdict, DepositVerdict::Reject(ErrorCode::InsufficientBalance));

    // Wants 1 USDT, holds 1.
    let verdict = harness
        .eligibility
        .authorize_deposit(PRESALE, NETWORK_ID, &request("1000000", "0"))
        .await
        .into_result()
        .unwrap();
    assert_eq!(verdict, DepositVerdict::Allow);
}

#[tokio::test]
async fn sold_out_wins_over_later_checks() {
    let harness = Harness::new().await;
    let mut draft = live_draft(PRESALE, Currency::Usdt);
    draft.hard_cap = "100".parse().unwrap();
    draft.access_type = AccessType::Private;
    harness
        .store
        .create_campaign(
            &draft,
            &["0x3333333333333333333333333333333333333333".to_string()],
        )
        .await
        .unwrap();

    harness
        .chain
        .set_response(PRESALE, "STATUS", status_payload("200000000", 99));

    // The depositor is not whitelisted either, but the sold-out check fires
    // first and decides the rejection reason.
    let verdict = harness
        .eligibility
        .authorize_deposit(PRESALE, NETWORK_ID, &request("1000000", "0"))
        .await
        .into_result()
        .unwrap();

    assert_eq!(verdict, DepositVerdict::Reject(ErrorCode::AllTokenSoldOut));
}

#[tokio::test]
async fn transport_failure_surfaces_as_system_error() {
    let harness = Harness::new().await;
    let draft = live_draft(PRESALE, Currency::Eth);
    harness.store.create_campaign(&draft, &[]).await.unwrap();

    // No STATUS response wired: the chain read fails.
    let result = harness
        .eligibility
        .authorize_deposit(PRESALE, NETWORK_ID, &request("0", "1"))
        .await;

    assert!(!result.success);
    assert_eq!(result.error_code(), Some(ErrorCode::SystemError));
}

#[tokio::test]
async fn created_whitelist_is_loadable_and_immutable_shape() {
    let harness = Harness::new().await;
    let mut draft = live_draft(PRESALE, Currency::Eth);
    draft.access_type = AccessType::Private;
    let campaign_id = harness
        .store
        .create_campaign(&draft, &[DEPOSITOR.to_string()])
        .await
        .unwrap();

    let aggregate = harness
        .store
        .campaign_by_id(campaign_id, CampaignInclude::whitelist())
        .await
        .unwrap()
        .unwrap();

    let whitelist = aggregate.whitelist.unwrap();
    assert_eq!(whitelist.len(), 1);
    assert_eq!(whitelist[0].wallet_address, DEPOSITOR);
}
