//! Contract deployment and library resolution

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use contract_abi::{
    AbiTable, Address, ConstructorDescriptor, ContractArtifact, DescriptorCache, LogDecoder, Token,
};

use crate::client::RpcClient;
use crate::config::RuntimeConfig;
use crate::contract::Contract;
use crate::lifecycle::{self, AwaitOptions};
use crate::types::TxRequest;
use crate::ContractError;

/// Deploys linked library bytecode
#[async_trait]
pub trait LibraryDeployer: Send + Sync {
    /// Deploy fully linked `bytecode` for library `name`
    async fn deploy_library(&self, name: &str, bytecode: Vec<u8>) -> Result<Address, ContractError>;
}

type ResolveFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ContractError>> + Send + 'a>>;

/// Deploys the libraries an artifact links against, dependencies first
pub struct LibraryResolver<'a> {
    deployer: &'a dyn LibraryDeployer,
}

impl<'a> LibraryResolver<'a> {
    /// Resolver deploying through `deployer`
    pub fn new(deployer: &'a dyn LibraryDeployer) -> Self {
        Self { deployer }
    }

    /// Address of every library `artifact` needs, deploying the missing ones
    ///
    /// Libraries are deployed in post-order, so a library's own references
    /// are linked before it is deployed. A library shared by several
    /// dependents is deployed once.
    pub async fn resolve(
        &self,
        artifact: &ContractArtifact,
        available: &HashMap<String, ContractArtifact>,
        already_deployed: HashMap<String, Address>,
    ) -> Result<HashMap<String, Address>, ContractError> {
        let mut deployed = already_deployed;
        let mut visiting = Vec::new();
        if !artifact.contract_name.is_empty() {
            visiting.push(artifact.contract_name.clone());
        }
        self.resolve_into(artifact, available, &mut deployed, &mut visiting)
            .await?;
        Ok(deployed)
    }

    fn resolve_into<'b>(
        &'b self,
        artifact: &'b ContractArtifact,
        available: &'b HashMap<String, ContractArtifact>,
        deployed: &'b mut HashMap<String, Address>,
        visiting: &'b mut Vec<String>,
    ) -> ResolveFuture<'b> {
        Box::pin(async move {
            for name in artifact.libraries() {
                if deployed.contains_key(&name) {
                    continue;
                }
                if let Some(start) = visiting.iter().position(|v| *v == name) {
                    let mut cycle = visiting[start..].to_vec();
                    cycle.push(name);
                    return Err(ContractError::LibraryCycle(cycle));
                }
                let library = available
                    .get(&name)
                    .ok_or_else(|| ContractError::MissingLibraryArtifact(name.clone()))?;

                visiting.push(name.clone());
                self.resolve_into(library, available, deployed, visiting)
                    .await?;
                visiting.pop();

                let bytecode = library.bytecode.link(deployed)?;
                let address = self.deployer.deploy_library(&name, bytecode).await?;
                tracing::info!(library = %name, address = ?address, "Library deployed");
                deployed.insert(name, address);
            }
            Ok(())
        })
    }
}

/// Deploys contracts through `eth_sendTransaction`
pub struct Deployer {
    client: RpcClient,
    config: RuntimeConfig,
    overrides: TxRequest,
    cache: Option<Arc<DescriptorCache>>,
}

impl Deployer {
    /// Deployer with the default configuration
    pub fn new(client: RpcClient) -> Self {
        Self {
            client,
            config: RuntimeConfig::default(),
            overrides: TxRequest::default(),
            cache: None,
        }
    }

    /// Replace the runtime configuration
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Fields applied to every deployment transaction (sender, value, gas)
    pub fn with_overrides(mut self, overrides: TxRequest) -> Self {
        self.overrides = overrides;
        self
    }

    /// Share descriptor tables through `cache`
    pub fn with_cache(mut self, cache: Arc<DescriptorCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Deploy creation code followed by encoded constructor arguments
    ///
    /// Returns the address from the receipt.
    pub async fn deploy(
        &self,
        bytecode: &[u8],
        constructor: &ConstructorDescriptor,
        args: &[Token],
    ) -> Result<Address, ContractError> {
        let mut data = bytecode.to_vec();
        data.extend(constructor.encode_args(args)?);

        let request = TxRequest {
            to: None,
            data: Some(Bytes::from(data)),
            ..self.overrides.clone()
        };
        let request = lifecycle::apply_defaults(
            &self.client,
            request,
            &self.config.tx_defaults(),
            self.config.estimate_gas,
        )
        .await?;

        let pending = lifecycle::send(&self.client, &request, Arc::new(LogDecoder::new())).await?;
        let receipt = pending
            .await_result(AwaitOptions::from_config(&self.config))
            .await?;
        let address = receipt
            .contract_address
            .ok_or(ContractError::MissingContractAddress {
                hash: receipt.transaction_hash,
            })?;
        tracing::info!(address = ?address, hash = ?receipt.transaction_hash, "Contract deployed");
        Ok(address)
    }

    /// Deploy an artifact without library references
    pub async fn deploy_artifact(
        &self,
        artifact: &ContractArtifact,
        args: &[Token],
    ) -> Result<Contract, ContractError> {
        self.deploy_linked(artifact, &HashMap::new(), args).await
    }

    /// Deploy the libraries of `artifact`, then the artifact itself
    pub async fn deploy_with_libraries(
        &self,
        artifact: &ContractArtifact,
        libraries: &HashMap<String, ContractArtifact>,
        args: &[Token],
    ) -> Result<Contract, ContractError> {
        let addresses = LibraryResolver::new(self)
            .resolve(artifact, libraries, HashMap::new())
            .await?;
        self.deploy_linked(artifact, &addresses, args).await
    }

    async fn deploy_linked(
        &self,
        artifact: &ContractArtifact,
        addresses: &HashMap<String, Address>,
        args: &[Token],
    ) -> Result<Contract, ContractError> {
        let table = self.table(artifact)?;
        let bytecode = artifact.bytecode.link(addresses)?;
        let address = self.deploy(&bytecode, table.constructor(), args).await?;
        Ok(Contract::new(address, table, self.client.clone()).with_config(self.config.clone()))
    }

    fn table(&self, artifact: &ContractArtifact) -> Result<Arc<AbiTable>, ContractError> {
        Ok(match &self.cache {
            Some(cache) => cache.get_or_insert(&artifact.contract_name, artifact.abi.clone())?,
            None => Arc::new(AbiTable::from_abi(artifact.abi.clone())?),
        })
    }
}

#[async_trait]
impl LibraryDeployer for Deployer {
    async fn deploy_library(&self, _name: &str, bytecode: Vec<u8>) -> Result<Address, ContractError> {
        self.deploy(&bytecode, &ConstructorDescriptor::default(), &[])
            .await
    }
}
