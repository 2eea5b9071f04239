use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::command::{Command, Selector};
use crate::model::{AccountId, Reference, Role, Wallet, WalletCode, WalletStatus};
use crate::Amount;

/// Errors that can occur when reading command scripts or writing balances
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized operation '{op}'")]
    UnrecognizedOp { line: usize, op: String },

    #[error("line {line}: {op} missing {field}")]
    MissingField {
        line: usize,
        op: String,
        field: &'static str,
    },

    #[error("line {line}: invalid amount '{value}'")]
    InvalidAmount { line: usize, value: String },

    #[error("line {line}: invalid wallet code '{value}'")]
    InvalidWallet { line: usize, value: String },

    #[error("line {line}: invalid reference '{value}'")]
    InvalidReference { line: usize, value: String },

    #[error("failed to write csv: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush output: {0}")]
    Flush(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct InputRow {
    op: String,
    actor: Option<String>,
    role: Option<String>,
    wallet: Option<String>,
    amount: Option<String>,
    reference: Option<String>,
    code: Option<String>,
    pin: Option<String>,
    note: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    wallet: &'a str,
    owner: &'a str,
    balance: String,
    status: &'static str,
}

/// Read a command script from a csv file.
///
/// Columns: `op,actor,role,wallet,amount,reference,code,pin,note`. Which
/// columns an operation needs depends on the operation; the others may be
/// left empty.
pub fn read_commands(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Command, CsvError>>, CsvError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            row.to_command(line)
        }))
}

impl InputRow {
    fn to_command(&self, line: usize) -> Result<Command, CsvError> {
        let command = match self.op.as_str() {
            "open" => Command::OpenWallet {
                account: self.account(line)?,
                code: self.wallet.as_deref().map(|w| wallet(line, w)).transpose()?,
            },
            "issue_code" => {
                let role = self.role(line)?;
                let amount = self.amount(line)?;
                match &self.code {
                    Some(code) => Command::ImportCode {
                        role,
                        code: code.clone(),
                        pin: self.pin.clone().ok_or_else(|| self.missing(line, "pin"))?,
                        amount,
                    },
                    None => Command::IssueCode { role, amount },
                }
            }
            "redeem" => Command::Redeem {
                account: self.account(line)?,
                code: self.code.clone().ok_or_else(|| self.missing(line, "code"))?,
                pin: self.pin.clone().ok_or_else(|| self.missing(line, "pin"))?,
            },
            "send" => Command::Send {
                account: self.account(line)?,
                recipient: self.wallet.clone().ok_or_else(|| self.missing(line, "wallet"))?,
                amount: self.amount(line)?,
                note: self.note.clone(),
            },
            "withdraw" => Command::Withdraw {
                account: self.account(line)?,
                amount: self.amount(line)?,
            },
            "process" => {
                let target = match (self.reference(line)?, self.wallet.as_deref()) {
                    (Some(reference), _) => Selector::Reference(reference),
                    (None, Some(w)) => Selector::Oldest(wallet(line, w)?),
                    (None, None) => return Err(self.missing(line, "reference or wallet")),
                };
                Command::ProcessWithdrawal {
                    role: self.role(line)?,
                    staff: self.account(line)?,
                    target,
                }
            }
            "cancel" => Command::CancelWithdrawal {
                account: self.account(line)?,
                reference: self.reference(line)?,
            },
            "invoice" => Command::IssueInvoice {
                account: self.account(line)?,
                recipient: self.wallet.clone().ok_or_else(|| self.missing(line, "wallet"))?,
                amount: self.amount(line)?,
                purpose: self.note.clone().ok_or_else(|| self.missing(line, "note"))?,
                note: None,
            },
            "pay" => Command::PayInvoice {
                account: self.account(line)?,
                reference: self.reference(line)?,
            },
            op @ ("suspend" | "activate" | "terminate") => {
                let status = match op {
                    "suspend" => WalletStatus::Suspended,
                    "activate" => WalletStatus::Active,
                    _ => WalletStatus::Terminated,
                };
                let code = self.wallet.as_deref().ok_or_else(|| self.missing(line, "wallet"))?;
                Command::SetStatus {
                    role: self.role(line)?,
                    wallet: wallet(line, code)?,
                    status,
                }
            }
            "sweep" => Command::Sweep,
            other => {
                return Err(CsvError::UnrecognizedOp {
                    line,
                    op: other.to_string(),
                });
            }
        };
        Ok(command)
    }

    fn missing(&self, line: usize, field: &'static str) -> CsvError {
        CsvError::MissingField {
            line,
            op: self.op.clone(),
            field,
        }
    }

    fn account(&self, line: usize) -> Result<AccountId, CsvError> {
        self.actor
            .as_deref()
            .map(AccountId::new)
            .ok_or_else(|| self.missing(line, "actor"))
    }

    fn role(&self, line: usize) -> Result<Role, CsvError> {
        self.role
            .as_deref()
            .map(Role::new)
            .ok_or_else(|| self.missing(line, "role"))
    }

    fn amount(&self, line: usize) -> Result<Amount, CsvError> {
        let value = self.amount.as_deref().ok_or_else(|| self.missing(line, "amount"))?;
        Amount::parse(value).map_err(|_| CsvError::InvalidAmount {
            line,
            value: value.to_string(),
        })
    }

    fn reference(&self, line: usize) -> Result<Option<Reference>, CsvError> {
        self.reference
            .as_deref()
            .map(|value| {
                Reference::parse(value).ok_or_else(|| CsvError::InvalidReference {
                    line,
                    value: value.to_string(),
                })
            })
            .transpose()
    }
}

fn wallet(line: usize, value: &str) -> Result<WalletCode, CsvError> {
    WalletCode::parse(value).ok_or_else(|| CsvError::InvalidWallet {
        line,
        value: value.to_string(),
    })
}

/// Write wallet balances in csv format
pub fn write_wallets<'a>(
    out: impl io::Write,
    wallets: impl IntoIterator<Item = &'a Wallet>,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(out);

    for wallet in wallets {
        let code = wallet.code();
        let row = OutputRow {
            wallet: code.as_str(),
            owner: wallet.owner().as_str(),
            balance: wallet.balance().to_string(),
            status: wallet.status().as_str(),
        };
        writer.serialize(&row)?;
    }

    writer.flush()?;
    Ok(())
}
