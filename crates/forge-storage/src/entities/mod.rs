pub mod client_key_scopes;
pub mod client_keys;
pub mod global_config;
pub mod payment_records;
pub mod provider_credentials;
pub mod tenants;
pub mod usage_records;
pub mod wallets;

pub use client_key_scopes::Entity as ClientKeyScopes;
pub use client_keys::Entity as ClientKeys;
pub use global_config::Entity as GlobalConfig;
pub use payment_records::Entity as PaymentRecords;
pub use provider_credentials::Entity as ProviderCredentials;
pub use tenants::Entity as Tenants;
pub use usage_records::Entity as UsageRecords;
pub use wallets::Entity as Wallets;
