//! End-to-end tests: compile a contract, sign spends and run them through the verifier
//!
//! Every spend the payout calculator produces must be accepted, and outputs that deviate
//! from it must be rejected by the script itself.

use bitcoin::{
    consensus::encode::serialize, Amount, OutPoint, ScriptBuf, Sequence, TxIn, TxOut, Witness,
};
use proptest::prelude::*;
use secp256k1::SecretKey;

use xec_split::contract::*;
use xec_split::ecash_utils::{derive_public_key, p2sh_script, parse_private_key};
use xec_split::types::*;
use xec_split::Error;

const A: &str = "ecash:qq28cqs6dx23qh4qucnk9v3l2jt4yr242cxqqnw9kc";
const B: &str = "ecash:qq830d643lw865u0x7mpc4yzsrvt9peccggju7td2v";
const C: &str = "ecash:qq0exytv2e3ylet2yz5wxzhpwlftw05rgg4eu0yqwc";
const A_SCRIPT: &str = "76a914147c021a6995105ea0e62762b23f5497520d555688ac";
const B_SCRIPT: &str = "76a9140f17b7558fdc7d538f37b61c548280d8b28738c288ac";
const C_SCRIPT: &str = "76a9141f93116c56624fe56a20a8e30ae177d2b73e834288ac";
const WIF: &str = "L2vP83Ct244KpL16aCRqdzUp8Rj58d9xVzpuaaHs4STVHQbJERBi";
const TXID: &str = "0000000000000000000000000000000000000000000000000000000000000001";
const FEE: u64 = 2000;

fn key() -> SecretKey {
    parse_private_key(WIF).unwrap()
}

fn two_parties() -> Vec<Party> {
    vec![Party::new(A, 900), Party::new(B, 100)]
}

fn three_parties() -> Vec<Party> {
    vec![Party::new(A, 400), Party::new(B, 300), Party::new(C, 300)]
}

fn contract(fee: u64, parties: &[Party]) -> ContractScript {
    compile_script(&derive_public_key(&key()), fee, parties).unwrap()
}

fn utxo(value: u64) -> Utxo {
    Utxo::new(TXID.parse().unwrap(), 0, value)
}

fn output(value: u64, script_hex: &str) -> TxOut {
    TxOut {
        value: Amount::from_sat(value),
        script_pubkey: ScriptBuf::from_bytes(hex::decode(script_hex).unwrap()),
    }
}

fn to_contract(contract: &ContractScript, value: u64) -> TxOut {
    TxOut {
        value: Amount::from_sat(value),
        script_pubkey: contract.script_pubkey(),
    }
}

/// Sign arbitrary outputs for a coin of `value` and run the verifier on the result.
fn spend_with(value: u64, parties: &[Party], outputs: Vec<TxOut>) -> Result<(), ScriptError> {
    let contract = contract(FEE, parties);
    let tx = sign_spend(&key(), &utxo(value), &contract, outputs).unwrap();
    verify_spend(&tx, 0, value, &contract)
}

fn honest_spend(value: u64, fee: u64, parties: &[Party]) -> Result<(), ScriptError> {
    let tx = create_tx(&key(), &utxo(value), fee, parties).unwrap();
    verify_spend(&tx, 0, value, &contract(fee, parties))
}

// ── Stability ────────────────────────────────────────────────────────────────

#[test]
fn test_reference_spend_is_stable() {
    let tx = create_tx(&key(), &utxo(8000), FEE, &two_parties()).unwrap();
    assert_eq!(
        tx.txid().to_string(),
        "c40ede5edbd8fa486c30baeed85430ccebb59e1e4c1f2a8b7dc0341693bd8947"
    );
    assert_eq!(serialize(&tx).len(), 1070);
    assert_eq!(
        contract(FEE, &two_parties()).address(),
        "ecash:ppnh4jax506sfcwn4yfztmf3mvwwalvnegat2dt93s"
    );
    assert_eq!(
        contract(FEE, &three_parties()).hash_hex(),
        "7ee71d8d47fe8a495229346b79eb2efa9a08cdac"
    );
}

// ── Honest spends ────────────────────────────────────────────────────────────

#[test]
fn test_honest_spends_verify() {
    for value in [
        2001,
        2999,
        3000,
        7999,
        8000,
        10_000,
        MAX_VALUE,
        MAX_VALUE + 1,
        MAX_VALUE + 2,
        2_100_000_000_000_000,
    ] {
        assert_eq!(honest_spend(value, FEE, &two_parties()), Ok(()), "value {value}");
    }
    for value in [4000, 100_000, MAX_VALUE + 1] {
        assert_eq!(honest_spend(value, FEE, &three_parties()), Ok(()), "value {value}");
    }
}

#[test]
fn test_three_party_payouts() {
    let contract = contract(FEE, &three_parties());
    let outputs = |value| create_outputs(value, FEE, &contract, &three_parties()).unwrap();

    assert_eq!(
        outputs(100_000),
        vec![
            output(39_200, A_SCRIPT),
            output(29_400, B_SCRIPT),
            output(29_400, C_SCRIPT)
        ]
    );
    assert_eq!(
        outputs(4000),
        vec![output(800, A_SCRIPT), output(600, B_SCRIPT), output(600, C_SCRIPT)]
    );
    assert_eq!(outputs(2500), vec![no_payout_output()]);

    let tx = create_tx(&key(), &utxo(100_000), FEE, &three_parties()).unwrap();
    assert_eq!(serialize(&tx).len(), 1237);
}

#[test]
fn test_carry_across_limbs() {
    let contract = contract(FEE, &two_parties());
    let outputs = vec![
        to_contract(&contract, 0xffff_ffff_ffff),
        to_contract(&contract, 0xff_ffff),
    ];
    let value = 0xffff_ffff_ffff + 0xff_ffff + FEE;
    assert_eq!(spend_with(value, &two_parties(), outputs), Ok(()));
}

#[test]
fn test_fee_below_size_rejected() {
    let err = create_tx(&key(), &utxo(5000), 900, &two_parties()).unwrap_err();
    assert_eq!(
        err,
        Error::FeeTooLow {
            fee: 900,
            min_fee: 1002
        }
    );
    assert!(build_tx(&key(), &utxo(5000), 900, &two_parties()).is_ok());
}

// ── Rejected spends ──────────────────────────────────────────────────────────

#[test]
fn test_rejects_extra_output() {
    let outputs = vec![
        output(5400, A_SCRIPT),
        output(600, B_SCRIPT),
        output(546, C_SCRIPT),
    ];
    assert_eq!(
        spend_with(8000, &two_parties(), outputs),
        Err(ScriptError::Verify(0x88))
    );
}

#[test]
fn test_rejects_reordered_outputs() {
    let outputs = vec![output(600, B_SCRIPT), output(5400, A_SCRIPT)];
    assert!(spend_with(8000, &two_parties(), outputs).is_err());
}

#[test]
fn test_rejects_skipped_party() {
    let outputs = vec![output(5400, A_SCRIPT)];
    assert_eq!(
        spend_with(8000, &two_parties(), outputs),
        Err(ScriptError::SplitRange)
    );
}

#[test]
fn test_rejects_no_payout_when_payable() {
    let outputs = vec![no_payout_output()];
    assert!(spend_with(8000, &two_parties(), outputs).is_err());
}

#[test]
fn test_rejects_payout_below_minimum() {
    let outputs = vec![output(900, A_SCRIPT)];
    assert!(matches!(
        spend_with(2999, &two_parties(), outputs),
        Err(ScriptError::NumOverflow(_))
    ));
}

#[test]
fn test_rejects_wrong_party_value() {
    let outputs = vec![output(5400, A_SCRIPT), output(700, B_SCRIPT)];
    assert!(spend_with(8000, &two_parties(), outputs).is_err());
}

#[test]
fn test_share_division_tolerates_rounding() {
    // only `value / share == unit` is checked per output
    let outputs = vec![output(5499, A_SCRIPT), output(600, B_SCRIPT)];
    assert_eq!(spend_with(8000, &two_parties(), outputs), Ok(()));
}

#[test]
fn test_overflow_split_rules() {
    let value = MAX_VALUE + 2;
    let c = contract(FEE, &two_parties());

    let uneven = vec![to_contract(&c, 2_000_000_000), to_contract(&c, 147_481_649)];
    assert_eq!(spend_with(value, &two_parties(), uneven), Ok(()));

    let short = vec![to_contract(&c, 1_073_740_825), to_contract(&c, 1_073_740_823)];
    assert!(spend_with(value, &two_parties(), short).is_err());

    let elsewhere = vec![
        to_contract(&c, 1_073_740_825),
        TxOut {
            value: Amount::from_sat(1_073_740_824),
            script_pubkey: p2sh_script(&[0u8; 20]),
        },
    ];
    assert!(spend_with(value, &two_parties(), elsewhere).is_err());

    let three = vec![
        to_contract(&c, 1_073_740_825),
        to_contract(&c, 1_073_740_823),
        to_contract(&c, 1),
    ];
    assert!(spend_with(value, &two_parties(), three).is_err());
}

#[test]
fn test_payouts_to_parties_verify() {
    // each party output is compared against its locking script without the size byte
    for (value, paid) in [(7999, vec![4500]), (8000, vec![5400, 600])] {
        let tx = create_tx(&key(), &utxo(value), FEE, &two_parties()).unwrap();
        let values: Vec<u64> = tx.output.iter().map(|o| o.value.to_sat()).collect();
        assert_eq!(values, paid);
        assert_eq!(
            verify_spend(&tx, 0, value, &contract(FEE, &two_parties())),
            Ok(()),
            "value {value}"
        );
    }
}

#[test]
fn test_rejects_second_input() {
    let c = contract(FEE, &two_parties());
    for value in [2999, 8000] {
        let outputs = create_outputs(value, FEE, &c, &two_parties()).unwrap();
        let mut tx = sign_spend(&key(), &utxo(value), &c, outputs).unwrap();
        tx.input.push(TxIn {
            previous_output: OutPoint::new(TXID.parse().unwrap(), 3),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        });
        sign_input(&key(), &mut tx, 0, value, &c).unwrap();

        // hashPrevouts matches, but the prevouts are more than the spent outpoint
        assert_eq!(
            verify_spend(&tx, 0, value, &c),
            Err(ScriptError::Verify(0x88)),
            "value {value}"
        );
    }
}

#[test]
fn test_rejects_wrong_value_or_contract() {
    let tx = create_tx(&key(), &utxo(8000), FEE, &two_parties()).unwrap();
    let c = contract(FEE, &two_parties());

    // sighash commits to the spent value
    assert_eq!(verify_spend(&tx, 0, 9000, &c), Err(ScriptError::NullFail));
    assert_eq!(
        verify_spend(&tx, 0, 8000, &contract(2001, &two_parties())),
        Err(ScriptError::ScriptHash)
    );
    assert_eq!(
        verify_spend(&tx, 1, 8000, &c),
        Err(ScriptError::InputIndex(1))
    );
}

#[test]
fn test_rejects_foreign_key() {
    let other = SecretKey::from_slice(&[7u8; 32]).unwrap();
    let c = contract(FEE, &two_parties());
    let outputs = create_outputs(8000, FEE, &c, &two_parties()).unwrap();
    let tx = sign_spend(&other, &utxo(8000), &c, outputs).unwrap();
    assert_eq!(verify_spend(&tx, 0, 8000, &c), Err(ScriptError::NullFail));
}

// ── Laws ─────────────────────────────────────────────────────────────────────

fn party_sets() -> impl Strategy<Value = Vec<Party>> {
    prop_oneof![
        (1u32..=999).prop_map(|a| vec![Party::new(A, a), Party::new(B, 1000 - a)]),
        (1u32..=998, 1u32..=998)
            .prop_filter("shares must leave room for a third party", |(a, b)| a + b < 1000)
            .prop_map(|(a, b)| vec![
                Party::new(A, a),
                Party::new(B, b),
                Party::new(C, 1000 - a - b)
            ]),
    ]
}

proptest! {
    #[test]
    fn prop_overflow_returns_everything_to_contract(
        value in (MAX_VALUE + 1)..=2_100_000_000_000_000u64,
        fee in 1u64..=100_000,
    ) {
        let c = contract(fee, &two_parties());
        let outputs = create_outputs(value, fee, &c, &two_parties()).unwrap();
        prop_assert_eq!(outputs.len(), 2);
        prop_assert!(outputs.iter().all(|o| o.script_pubkey == c.script_pubkey()));
        let total: u64 = outputs.iter().map(|o| o.value.to_sat()).sum();
        prop_assert_eq!(total + fee, value);
    }

    #[test]
    fn prop_dust_is_never_paid(
        value in 0u64..=MAX_VALUE,
        fee in 1u64..=10_000,
        parties in party_sets(),
    ) {
        let c = contract(fee, &parties);
        let outputs = create_outputs(value, fee, &c, &parties).unwrap();
        prop_assert!(!outputs.is_empty());
        if outputs == vec![no_payout_output()] {
            return Ok(());
        }

        let unit = (value - fee) / SHARE_TOTAL;
        let expected: Vec<u64> = parties
            .iter()
            .map(|p| unit * p.share as u64)
            .filter(|v| *v >= DUST_THRESHOLD)
            .collect();
        let paid: Vec<u64> = outputs.iter().map(|o| o.value.to_sat()).collect();
        prop_assert_eq!(paid, expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_calculated_spends_verify(
        value in prop_oneof![
            2_000u64..=20_000,
            2_000u64..=MAX_VALUE,
            (MAX_VALUE + 1)..=2_100_000_000_000_000u64,
        ],
        fee in prop_oneof![Just(1300u64), Just(2000), Just(5000)],
        parties in party_sets(),
    ) {
        prop_assert_eq!(honest_spend(value, fee, &parties), Ok(()));
    }
}
