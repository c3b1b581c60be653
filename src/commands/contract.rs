//! Contract command: print the address and limits of a split contract
use anyhow::*;
use secp256k1::SecretKey;

use crate::contract::describe;
use crate::ecash_utils::{contract_key, parse_private_key};
use crate::types::*;

/// Parameters every command needs to rebuild a contract.
#[derive(clap::Args, Debug, Clone)]
pub struct ContractArgs {
    /// Fee paid by every split transaction, in sats
    #[arg(long)]
    pub fee: u64,
    /// `<address>:<share>` in payout order, shares in thousandths
    #[arg(long = "party", required = true)]
    pub parties: Vec<String>,
    /// Signing key (WIF or hex); defaults to the published contract key
    #[arg(long, env = "XEC_SPLIT_KEY", hide_env_values = true)]
    pub key: Option<String>,
}

impl ContractArgs {
    pub fn signing_key(&self) -> Result<SecretKey> {
        match &self.key {
            Some(key) => Ok(parse_private_key(key)?),
            None => Ok(contract_key()?),
        }
    }

    pub fn parse_parties(&self) -> Result<Vec<Party>> {
        self.parties.iter().map(|p| parse_party(p)).collect()
    }
}

/// Parse `<address>:<share>`; the address itself may contain a prefix separator.
pub fn parse_party(s: &str) -> Result<Party> {
    let (address, share) = s
        .rsplit_once(':')
        .with_context(|| format!("party must be <address>:<share>, got {s}"))?;
    let share: u32 = share
        .parse()
        .with_context(|| format!("invalid share in {s}"))?;
    Ok(Party::new(address, share))
}

#[derive(clap::Parser, Debug)]
pub struct ContractOpts {
    #[command(flatten)]
    pub contract: ContractArgs,
}

pub fn run_contract(o: ContractOpts) -> Result<()> {
    let sk = o.contract.signing_key()?;
    let parties = o.contract.parse_parties()?;
    let summary = describe(&sk, o.contract.fee, &parties)?;

    eprintln!("Contract address: {}", summary.address);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_party() {
        let party = parse_party("ecash:qq28cqs6dx23qh4qucnk9v3l2jt4yr242cxqqnw9kc:900").unwrap();
        assert_eq!(party.address, "ecash:qq28cqs6dx23qh4qucnk9v3l2jt4yr242cxqqnw9kc");
        assert_eq!(party.share, 900);

        let bare = parse_party("qq28cqs6dx23qh4qucnk9v3l2jt4yr242cxqqnw9kc:100").unwrap();
        assert_eq!(bare.share, 100);

        assert!(parse_party("ecash:qq28cqs6dx23qh4qucnk9v3l2jt4yr242cxqqnw9kc").is_err());
        assert!(parse_party("qq28cqs6dx23qh4qucnk9v3l2jt4yr242cxqqnw9kc").is_err());
    }

    #[test]
    fn test_default_key() {
        let args = ContractArgs {
            fee: 2000,
            parties: vec![],
            key: None,
        };
        assert_eq!(args.signing_key().unwrap(), contract_key().unwrap());
    }
}
