//! # contract-runtime
//!
//! Async runtime for interacting with deployed EVM contracts.
//!
//! ## Features
//!
//! - **Calls**: simulate, estimate, build access lists and submit any ABI
//!   function through an [`InvocationHandle`]
//! - **Lifecycle**: pending transactions with receipt polling and log decoding
//! - **Deployment**: constructor encoding and recursive library linking
//! - **Events**: polling subscriptions with indexed-argument filters
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use contract_abi::{AbiTable, Address, Token};
//! use contract_runtime::{AwaitOptions, Contract, RpcClient, SubmitOptions, TxRequest};
//!
//! # async fn example() -> Result<(), contract_runtime::ContractError> {
//! let client = RpcClient::connect("http://localhost:8545").await?;
//! let table = Arc::new(AbiTable::from_json(r#"[
//!     {"type":"function","name":"transfer",
//!      "inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
//!      "outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"}
//! ]"#)?);
//! let token = Contract::new(Address::repeat_byte(0x11), table, client);
//!
//! let receipt = token
//!     .method("transfer", vec![Token::Address(Address::zero()), Token::uint(1000)])?
//!     .submit_and_await(TxRequest::default(), SubmitOptions::default(), AwaitOptions::default())
//!     .await?;
//! println!("mined in block {:?}", receipt.block_number);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod contract;
pub mod deploy;
pub mod error;
pub mod invocation;
pub mod lifecycle;
pub mod subscription;
pub mod transport;
pub mod types;

pub use client::RpcClient;
pub use config::RuntimeConfig;
pub use contract::{Callable, Contract, Submittable, Subscribable};
pub use deploy::{Deployer, LibraryDeployer, LibraryResolver};
pub use error::ContractError;
pub use invocation::{CallContext, InvocationHandle, SubmitOptions};
pub use lifecycle::{AwaitOptions, PendingTransaction};
pub use subscription::{EventCallback, SubscriptionManager, SubscriptionToken};
pub use transport::{MockReply, MockTransport, Transport};
pub use types::{
    AccessListItem, AccessListResult, BlockId, BlockRange, LogFilter, RpcReceipt,
    TransactionReceipt, TxRequest,
};

#[cfg(feature = "http")]
pub use transport::HttpTransport;

// Re-export the ABI crate for convenience
pub use contract_abi;
