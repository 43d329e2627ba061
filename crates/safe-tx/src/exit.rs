//! Process exit codes, one per error class.

use safe_multisig::SafeError;

pub const GENERIC: i32 = 1;
pub const CONFIGURATION: i32 = 2;
pub const RELAY: i32 = 3;
pub const HASH_MISMATCH: i32 = 4;
pub const INSUFFICIENT_SIGNATURES: i32 = 5;
pub const CHAIN: i32 = 6;
pub const SIGNING: i32 = 7;
pub const INVALID_TRANSITION: i32 = 8;

/// Exit code for a failed command. Benign outcomes (someone else already
/// confirmed or executed) exit with 0.
pub fn exit_code(err: &eyre::Report) -> i32 {
    let Some(err) = err.chain().find_map(|cause| cause.downcast_ref::<SafeError>()) else {
        return GENERIC;
    };

    match err {
        SafeError::AlreadyExecuted(_) | SafeError::AlreadyConfirmed(_) => 0,
        SafeError::Configuration(_) => CONFIGURATION,
        SafeError::Relay { .. } | SafeError::Http(_) | SafeError::Decode(_) => RELAY,
        SafeError::HashMismatch { .. } => HASH_MISMATCH,
        SafeError::InsufficientSignatures { .. } => INSUFFICIENT_SIGNATURES,
        SafeError::Chain(_) | SafeError::StaleNonce { .. } | SafeError::ReceiptTimeout(_) => CHAIN,
        SafeError::Signing(_) => SIGNING,
        SafeError::InvalidTransition { .. } => INVALID_TRANSITION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use eyre::WrapErr;
    use safe_multisig::HashSource;

    #[test]
    fn benign_outcomes_exit_cleanly() {
        let report = eyre::Report::new(SafeError::AlreadyConfirmed(B256::ZERO));
        assert_eq!(exit_code(&report), 0);

        let report = eyre::Report::new(SafeError::AlreadyExecuted(B256::ZERO));
        assert_eq!(exit_code(&report), 0);
    }

    #[test]
    fn error_classes_get_distinct_codes() {
        let relay = eyre::Report::new(SafeError::Relay {
            status: 400,
            body: r#"{"nonMultisigTransactionData": true}"#.into(),
        });
        let mismatch = eyre::Report::new(SafeError::HashMismatch {
            local: B256::ZERO,
            reported: B256::repeat_byte(1),
            origin: HashSource::Relay,
        });
        let insufficient =
            eyre::Report::new(SafeError::InsufficientSignatures { have: 1, need: 2 });

        assert_eq!(exit_code(&relay), RELAY);
        assert_eq!(exit_code(&mismatch), HASH_MISMATCH);
        assert_eq!(exit_code(&insufficient), INSUFFICIENT_SIGNATURES);
    }

    #[test]
    fn wrapped_errors_are_found() {
        let res: Result<(), SafeError> = Err(SafeError::configuration("chain id is not set"));
        let report = res.wrap_err("loading config").unwrap_err();
        assert_eq!(exit_code(&report), CONFIGURATION);

        assert_eq!(exit_code(&eyre::eyre!("something else")), GENERIC);
    }
}
