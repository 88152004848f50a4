pub mod asset_cleanup;
