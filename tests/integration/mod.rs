mod asset_transfer;
mod async_keeper;
mod determinism;
mod expiry;
mod invalid_context;
mod reactor_loop;
mod receiver_policy;
mod storage_persistence;
mod tampered_signature;
