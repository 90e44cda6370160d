use evm_transfer_indexer::services::config_service::ConfigService;
use serial_test::serial;

/// `load_chain_config` trims whitespace and drops empty entries from a
/// comma-separated `CHAIN_<id>_RPC_URLS`, keeping provider order stable.
#[test]
#[serial]
fn chain_config_trims_and_filters_provider_urls() {
    std::env::set_var(
        "CHAIN_7_RPC_URLS",
        " https://primary.example/rpc , https://secondary.example/rpc ,, ",
    );
    std::env::set_var("CHAIN_7_START_BLOCK", "123456");

    let config = ConfigService::load_chain_config(7).expect("chain 7 should be configured");

    assert_eq!(
        config.provider_urls,
        vec![
            "https://primary.example/rpc".to_string(),
            "https://secondary.example/rpc".to_string(),
        ]
    );
    assert_eq!(config.default_start_block, 123_456);

    std::env::remove_var("CHAIN_7_RPC_URLS");
    std::env::remove_var("CHAIN_7_START_BLOCK");
}

#[test]
#[serial]
fn chain_config_falls_back_to_indexer_start_block_default() {
    std::env::set_var("CHAIN_8_RPC_URLS", "https://only.example/rpc");
    std::env::remove_var("CHAIN_8_START_BLOCK");
    std::env::remove_var("INDEXER_START_BLOCK");

    let config = ConfigService::load_chain_config(8).expect("chain 8 should be configured");
    assert_eq!(config.default_start_block, 0);

    std::env::remove_var("CHAIN_8_RPC_URLS");
}

#[test]
#[serial]
fn chain_config_rejects_all_blank_provider_list() {
    std::env::set_var("CHAIN_9_RPC_URLS", " , , ");
    assert!(ConfigService::load_chain_config(9).is_err());
    std::env::remove_var("CHAIN_9_RPC_URLS");
}
