use alloy_primitives::{Address, B256};
use colored::Colorize;
use prettytable::{row, Table};
use safe_multisig::{SafeOverview, TransactionStatus, TxState};

use std::{
    future::Future,
    io::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

const SPINNER: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Runs a loading animation on stdout until `future` completes.
pub async fn print_loading_until_async<F, T>(message: &str, future: F) -> T
where
    F: Future<Output = T>,
{
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    let message = message.to_string();

    let animation = std::thread::spawn(move || {
        let mut i = 0;
        let mut stdout = std::io::stdout();

        while running_clone.load(Ordering::Relaxed) {
            print!("\r{} {} ", message, SPINNER[i]);
            let _ = stdout.flush();
            std::thread::sleep(Duration::from_millis(100));
            i = (i + 1) % SPINNER.len();
        }

        print!("\r{}\r", " ".repeat(message.len() + 2));
        let _ = stdout.flush();
    });

    let result = future.await;

    running.store(false, Ordering::Relaxed);
    let _ = animation.join();

    result
}

pub fn print_success_message(message: &str) {
    println!("{}", message.bright_green());
}

pub fn print_warning_message(message: &str) {
    println!("{}", message.yellow());
}

pub fn colored_state(state: &TxState) -> String {
    let text = state.to_string();
    match state {
        TxState::Executed => text.bright_green().to_string(),
        TxState::ReadyToExecute => text.green().to_string(),
        TxState::Failed { .. } => text.red().to_string(),
        TxState::Unconfirmed | TxState::PartiallyConfirmed => text.yellow().to_string(),
    }
}

fn join_addresses(addresses: &[Address]) -> String {
    if addresses.is_empty() {
        return "-".to_string();
    }
    addresses.iter().map(Address::to_string).collect::<Vec<_>>().join("\n")
}

/// One row per queued transaction, lowest nonce first.
pub fn pending_table(statuses: &[TransactionStatus]) -> Table {
    let mut table = Table::new();

    table.add_row(row!["nonce", "safe_tx_hash", "state", "confirmations", "rejected"]);
    for status in statuses {
        table.add_row(row![
            status.nonce,
            status.safe_tx_hash,
            colored_state(&status.state),
            format!("{}/{}", status.confirmations, status.threshold),
            status.rejected
        ]);
    }

    table
}

/// Detailed view of one transaction.
pub fn status_table(status: &TransactionStatus) -> Table {
    let mut table = Table::new();

    table.add_row(row!["safe_tx_hash", status.safe_tx_hash]);
    table.add_row(row!["nonce", status.nonce]);
    table.add_row(row!["state", colored_state(&status.state)]);
    table.add_row(row!["confirmations", format!("{}/{}", status.confirmations, status.threshold)]);
    table.add_row(row!["signers", join_addresses(&status.signers)]);
    table.add_row(row!["missing", join_addresses(&status.missing)]);
    if status.rejected > 0 {
        table.add_row(row!["rejected signatures", status.rejected]);
    }
    table.add_row(row!["executable", status.executable]);

    table
}

pub fn overview_table(overview: &SafeOverview) -> Table {
    let mut table = Table::new();

    table.add_row(row!["address", overview.info.address]);
    table.add_row(row!["chain_id", overview.chain_id]);
    table.add_row(row!["version", overview.version]);
    table.add_row(row!["nonce", overview.info.nonce]);
    table.add_row(row!["threshold", format!("{}/{}", overview.info.threshold, overview.info.owners.len())]);
    table.add_row(row!["owners", join_addresses(&overview.info.owners)]);
    table.add_row(row!["balance (wei)", overview.balance]);

    table
}

pub fn short_hash(hash: &B256) -> String {
    let hex = hash.to_string();
    format!("{}…{}", &hex[..10], &hex[hex.len() - 8..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn status(nonce: u64, state: TxState) -> TransactionStatus {
        TransactionStatus {
            safe_tx_hash: B256::repeat_byte(nonce as u8),
            nonce: U256::from(nonce),
            state,
            confirmations: 1,
            threshold: 2,
            signers: vec![Address::repeat_byte(0xa)],
            missing: vec![Address::repeat_byte(0xb)],
            rejected: 0,
            executable: false,
        }
    }

    #[test]
    fn pending_table_has_a_header_and_a_row_per_transaction() {
        let statuses = [status(4, TxState::PartiallyConfirmed), status(5, TxState::Unconfirmed)];
        let table = pending_table(&statuses);

        assert_eq!(table.len(), 3);
        let rendered = table.to_string();
        assert!(rendered.contains("1/2"));
        assert!(rendered.contains(&B256::repeat_byte(5).to_string()));
    }

    #[test]
    fn status_table_hides_rejected_row_when_empty() {
        let table = status_table(&status(4, TxState::PartiallyConfirmed));
        assert!(!table.to_string().contains("rejected signatures"));
    }

    #[test]
    fn short_hash_keeps_both_ends() {
        let short = short_hash(&B256::repeat_byte(0xab));
        assert!(short.starts_with("0xabababab"));
        assert!(short.ends_with("abababab"));
    }
}
