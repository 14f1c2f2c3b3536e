mod gateway_service;
mod keyholder_service;
mod ledger_service;

pub use gateway_service::GatewayEndpoint;
pub use keyholder_service::KeyHolderEndpoint;
pub use ledger_service::LedgerEndpoint;
