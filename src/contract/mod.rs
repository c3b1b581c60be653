//! Proportional split contracts: compiler, payout calculator, signer and local verifier

pub mod interpreter;
pub mod payment;
pub mod script;
pub mod shares;
pub mod summary;
pub mod tx;

pub use interpreter::{verify_spend, ScriptError};
pub use payment::{create_outputs, no_payout_output, PayoutMode};
pub use script::{compile_script, validate_contract, ContractScript, Node, Program};
pub use shares::{exact_quotient, min_unit_for_all_shares, min_unit_for_share};
pub use summary::{describe, summarize_spend};
pub use tx::{build_tx, check_fee, create_tx, sign_input, sign_spend};
