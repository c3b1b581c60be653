//! Summaries served to clients: contract parameters and signed spends

use bitcoin::{consensus::encode::serialize, hashes::Hash, Transaction, Txid};
use secp256k1::SecretKey;

use super::script::compile_script;
use super::shares::min_unit_for_all_shares;
use super::tx::build_tx;
use crate::ecash_utils::derive_public_key;
use crate::error::Result;
use crate::types::{
    ContractSummary, OutputSummary, Party, SpendSummary, Utxo, MAX_VALUE, SHARE_TOTAL,
};

/// Describe the contract signed by `sk` for `fee` and `parties`.
pub fn describe(sk: &SecretKey, fee: u64, parties: &[Party]) -> Result<ContractSummary> {
    let contract = compile_script(&derive_public_key(sk), fee, parties)?;
    let min_value = SHARE_TOTAL * min_unit_for_all_shares(parties)? + fee;

    // a coin worth exactly the fee always gets the no-payout output
    let placeholder = Utxo::new(Txid::from_byte_array([0u8; 32]), 0, fee);
    let dust_value = serialize(&build_tx(sk, &placeholder, fee, parties)?).len() as u64;

    Ok(ContractSummary {
        address: contract.address(),
        hash: contract.hash_hex(),
        fee,
        parties: parties.to_vec(),
        dust_value,
        min_value,
        max_value: MAX_VALUE,
    })
}

pub fn summarize_spend(tx: &Transaction) -> SpendSummary {
    SpendSummary {
        tx: hex::encode(serialize(tx)),
        txid: tx.txid().to_string(),
        size: serialize(tx).len(),
        outputs: tx
            .output
            .iter()
            .map(|o| OutputSummary {
                value: o.value.to_sat(),
                script: hex::encode(o.script_pubkey.as_bytes()),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::tx::create_tx;
    use crate::ecash_utils::{contract_key, parse_private_key};
    use crate::types::MAX_FEE;

    const A: &str = "ecash:qq28cqs6dx23qh4qucnk9v3l2jt4yr242cxqqnw9kc";
    const B: &str = "ecash:qq830d643lw865u0x7mpc4yzsrvt9peccggju7td2v";

    fn parties() -> Vec<Party> {
        vec![Party::new(A, 900), Party::new(B, 100)]
    }

    #[test]
    fn test_describe_default_key() {
        let summary = describe(&contract_key().unwrap(), 2000, &parties()).unwrap();
        assert_eq!(
            summary.address,
            "ecash:prhx0zfp2ls08n4fffszx9t2jr4xkytepy5qht3tvz"
        );
        assert_eq!(summary.hash, "ee67892157e0f3cea94a6023156a90ea6b117909");
        assert_eq!(summary.fee, 2000);
        assert_eq!(summary.parties, parties());
        assert_eq!(summary.dust_value, 954);
        assert_eq!(summary.min_value, 3000);
        assert_eq!(summary.max_value, 0x7fff_ffff);
    }

    #[test]
    fn test_describe_small_shares() {
        let parties = vec![Party::new(A, 545), Party::new(B, 455)];
        let summary = describe(&contract_key().unwrap(), 1000, &parties).unwrap();
        assert_eq!(summary.min_value, 3000);
    }

    #[test]
    fn test_describe_large_fee() {
        let summary = describe(&contract_key().unwrap(), MAX_FEE, &parties()).unwrap();
        assert_eq!(summary.min_value, 1000 + MAX_FEE);
        assert!(summary.dust_value < MAX_FEE);
    }

    #[test]
    fn test_summarize_spend() {
        let sk = parse_private_key("L2vP83Ct244KpL16aCRqdzUp8Rj58d9xVzpuaaHs4STVHQbJERBi").unwrap();
        let utxo = Utxo::new(
            "0000000000000000000000000000000000000000000000000000000000000001"
                .parse()
                .unwrap(),
            0,
            8000,
        );
        let summary = summarize_spend(&create_tx(&sk, &utxo, 2000, &parties()).unwrap());
        assert_eq!(
            summary.txid,
            "c40ede5edbd8fa486c30baeed85430ccebb59e1e4c1f2a8b7dc0341693bd8947"
        );
        assert_eq!(summary.size, 1070);
        assert_eq!(summary.tx.len(), 2 * 1070);
        assert_eq!(summary.outputs.len(), 2);
        assert_eq!(summary.outputs[0].value, 5400);
        assert_eq!(
            summary.outputs[1].script,
            "76a9140f17b7558fdc7d538f37b61c548280d8b28738c288ac"
        );
    }
}
