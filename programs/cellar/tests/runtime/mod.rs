#![allow(dead_code)]

//! Native execution of cellar instructions.
//!
//! Instructions enter through the program's generated `entry` over a bank of
//! accounts. Syscall stubs route cross-program calls to the real SPL token
//! and associated token processors and to a minimal system program. A
//! failing instruction leaves the bank untouched.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    sync::Once,
};

use anchor_lang::{
    prelude::*,
    solana_program::{
        bpf_loader,
        entrypoint::{ProgramResult, SUCCESS},
        instruction::Instruction,
        program_option::COption,
        program_pack::Pack,
        program_stubs::{self, SyscallStubs},
        program_utils::limited_deserialize,
        system_instruction::SystemInstruction,
        system_program,
    },
};
use anchor_spl::{
    associated_token::{self, get_associated_token_address, spl_associated_token_account},
    token::{self, spl_token},
};

pub const GENESIS: i64 = 1_700_000_000;

/// Largest serialized transaction, bounds system instruction decoding
const PACKET_DATA_SIZE: u64 = 1232;

static INSTALL: Once = Once::new();

thread_local! {
    static NOW: Cell<i64> = const { Cell::new(GENESIS) };
    /// Programs currently executing, innermost last
    static CALL_STACK: RefCell<Vec<Pubkey>> = const { RefCell::new(Vec::new()) };
    static RETURN_DATA: RefCell<Option<(Pubkey, Vec<u8>)>> = const { RefCell::new(None) };
}

fn current_program() -> Pubkey {
    CALL_STACK.with(|stack| stack.borrow().last().copied().unwrap_or(::cellar::ID))
}

fn run_as(program_id: Pubkey, f: impl FnOnce() -> ProgramResult) -> ProgramResult {
    CALL_STACK.with(|stack| stack.borrow_mut().push(program_id));
    let result = f();
    CALL_STACK.with(|stack| stack.borrow_mut().pop());
    result
}

struct NativeRuntime;

impl SyscallStubs for NativeRuntime {
    fn sol_invoke_signed(
        &self,
        instruction: &Instruction,
        account_infos: &[AccountInfo],
        signers_seeds: &[&[&[u8]]],
    ) -> ProgramResult {
        let caller = current_program();
        let signers = signers_seeds
            .iter()
            .map(|seeds| Pubkey::create_program_address(seeds, &caller))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| ProgramError::InvalidSeeds)?;

        let mut accounts = Vec::with_capacity(instruction.accounts.len());
        for meta in &instruction.accounts {
            let info = account_infos
                .iter()
                .find(|info| *info.key == meta.pubkey)
                .ok_or(ProgramError::NotEnoughAccountKeys)?;
            if meta.is_signer && !(info.is_signer || signers.contains(info.key)) {
                return Err(ProgramError::MissingRequiredSignature);
            }
            if meta.is_writable && !info.is_writable {
                return Err(ProgramError::InvalidArgument);
            }
            let mut info = info.clone();
            info.is_signer = meta.is_signer;
            info.is_writable = meta.is_writable;
            accounts.push(info);
        }

        let program_id = instruction.program_id;
        run_as(program_id, || dispatch(&program_id, &accounts, &instruction.data))
    }

    fn sol_get_clock_sysvar(&self, var_addr: *mut u8) -> u64 {
        let clock = Clock {
            unix_timestamp: NOW.with(Cell::get),
            ..Clock::default()
        };
        unsafe { std::ptr::write(var_addr as *mut Clock, clock) };
        SUCCESS
    }

    fn sol_get_rent_sysvar(&self, var_addr: *mut u8) -> u64 {
        unsafe { std::ptr::write(var_addr as *mut Rent, Rent::default()) };
        SUCCESS
    }

    fn sol_get_return_data(&self) -> Option<(Pubkey, Vec<u8>)> {
        RETURN_DATA.with(|slot| slot.borrow().clone())
    }

    fn sol_set_return_data(&self, data: &[u8]) {
        let program_id = current_program();
        RETURN_DATA.with(|slot| {
            *slot.borrow_mut() = (!data.is_empty()).then(|| (program_id, data.to_vec()));
        });
    }
}

fn dispatch(program_id: &Pubkey, accounts: &[AccountInfo], data: &[u8]) -> ProgramResult {
    if *program_id == token::ID {
        spl_token::processor::Processor::process(program_id, accounts, data)
    } else if *program_id == associated_token::ID {
        spl_associated_token_account::processor::process_instruction(program_id, accounts, data)
    } else if *program_id == system_program::ID {
        process_system(accounts, data)
    } else {
        Err(ProgramError::IncorrectProgramId)
    }
}

/// The system instructions account creation relies on
fn process_system(accounts: &[AccountInfo], data: &[u8]) -> ProgramResult {
    let instruction: SystemInstruction = limited_deserialize(data, PACKET_DATA_SIZE)
        .map_err(|_| ProgramError::InvalidInstructionData)?;
    match instruction {
        SystemInstruction::CreateAccount { lamports, space, owner } => {
            let [from, to, ..] = accounts else {
                return Err(ProgramError::NotEnoughAccountKeys);
            };
            allocate(to, space)?;
            move_lamports(from, to, lamports)?;
            to.assign(&owner);
            Ok(())
        }
        SystemInstruction::Transfer { lamports } => {
            let [from, to, ..] = accounts else {
                return Err(ProgramError::NotEnoughAccountKeys);
            };
            move_lamports(from, to, lamports)
        }
        SystemInstruction::Allocate { space } => {
            let [account, ..] = accounts else {
                return Err(ProgramError::NotEnoughAccountKeys);
            };
            allocate(account, space)
        }
        SystemInstruction::Assign { owner } => {
            let [account, ..] = accounts else {
                return Err(ProgramError::NotEnoughAccountKeys);
            };
            if !account.is_signer {
                return Err(ProgramError::MissingRequiredSignature);
            }
            if *account.owner != system_program::ID {
                return Err(ProgramError::IllegalOwner);
            }
            account.assign(&owner);
            Ok(())
        }
        _ => Err(ProgramError::InvalidInstructionData),
    }
}

fn move_lamports(from: &AccountInfo, to: &AccountInfo, lamports: u64) -> ProgramResult {
    if !from.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    if *from.owner != system_program::ID {
        return Err(ProgramError::IllegalOwner);
    }
    let remaining = from
        .lamports()
        .checked_sub(lamports)
        .ok_or(ProgramError::InsufficientFunds)?;
    let credited = to
        .lamports()
        .checked_add(lamports)
        .ok_or(ProgramError::ArithmeticOverflow)?;
    **from.try_borrow_mut_lamports()? = remaining;
    **to.try_borrow_mut_lamports()? = credited;
    Ok(())
}

/// Swap in zeroed storage of `space` bytes, shared by every clone of `account`
fn allocate(account: &AccountInfo, space: u64) -> ProgramResult {
    if !account.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    if *account.owner != system_program::ID || !account.data_is_empty() {
        return Err(ProgramError::AccountAlreadyInitialized);
    }
    let storage: &'static mut [u8] = Box::leak(vec![0; space as usize].into_boxed_slice());
    *account.try_borrow_mut_data()? = storage;
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoredAccount {
    pub lamports: u64,
    pub data: Vec<u8>,
    pub owner: Pubkey,
    pub executable: bool,
}

/// Account store instructions execute against
pub struct Bank {
    accounts: HashMap<Pubkey, StoredAccount>,
}

impl Bank {
    pub fn new() -> Self {
        INSTALL.call_once(|| {
            program_stubs::set_syscall_stubs(Box::new(NativeRuntime));
        });
        NOW.with(|now| now.set(GENESIS));
        RETURN_DATA.with(|slot| slot.borrow_mut().take());

        let mut accounts = HashMap::new();
        for program in [
            ::cellar::ID,
            token::ID,
            associated_token::ID,
            system_program::ID,
        ] {
            accounts.insert(
                program,
                StoredAccount {
                    lamports: 1,
                    data: Vec::new(),
                    owner: bpf_loader::ID,
                    executable: true,
                },
            );
        }
        Self { accounts }
    }

    pub fn now(&self) -> i64 {
        NOW.with(Cell::get)
    }

    pub fn warp(&mut self, seconds: i64) {
        NOW.with(|now| now.set(now.get() + seconds));
    }

    pub fn account(&self, key: &Pubkey) -> Option<&StoredAccount> {
        self.accounts.get(key)
    }

    pub fn fund(&mut self, key: &Pubkey, lamports: u64) {
        self.accounts.entry(*key).or_default().lamports += lamports;
    }

    pub fn create_mint(&mut self, mint: &Pubkey, authority: &Pubkey, decimals: u8) {
        let mut data = vec![0; spl_token::state::Mint::LEN];
        spl_token::state::Mint {
            mint_authority: COption::Some(*authority),
            supply: 0,
            decimals,
            is_initialized: true,
            freeze_authority: COption::None,
        }
        .pack_into_slice(&mut data);
        self.store_token_state(mint, data);
    }

    /// Token account at any address, minting `amount` into existence
    pub fn create_token_account(&mut self, address: &Pubkey, mint: &Pubkey, owner: &Pubkey, amount: u64) {
        let mut data = vec![0; spl_token::state::Account::LEN];
        spl_token::state::Account {
            mint: *mint,
            owner: *owner,
            amount,
            state: spl_token::state::AccountState::Initialized,
            ..Default::default()
        }
        .pack_into_slice(&mut data);
        self.store_token_state(address, data);

        if let Some(stored) = self.accounts.get_mut(mint) {
            let mut state = spl_token::state::Mint::unpack(&stored.data).unwrap();
            state.supply += amount;
            state.pack_into_slice(&mut stored.data);
        }
    }

    pub fn create_ata(&mut self, owner: &Pubkey, mint: &Pubkey, amount: u64) -> Pubkey {
        let address = get_associated_token_address(owner, mint);
        self.create_token_account(&address, mint, owner, amount);
        address
    }

    fn store_token_state(&mut self, address: &Pubkey, data: Vec<u8>) {
        let lamports = Rent::default().minimum_balance(data.len());
        self.accounts.insert(
            *address,
            StoredAccount {
                lamports,
                data,
                owner: token::ID,
                executable: false,
            },
        );
    }

    pub fn token_balance(&self, address: &Pubkey) -> u64 {
        let stored = self.account(address).expect("token account exists");
        spl_token::state::Account::unpack(&stored.data).unwrap().amount
    }

    /// Balance of the associated token account of (owner, mint)
    pub fn balance_of(&self, owner: &Pubkey, mint: &Pubkey) -> u64 {
        self.token_balance(&get_associated_token_address(owner, mint))
    }

    pub fn mint_supply(&self, mint: &Pubkey) -> u64 {
        let stored = self.account(mint).expect("mint exists");
        spl_token::state::Mint::unpack(&stored.data).unwrap().supply
    }

    /// Program-owned state decoded with its discriminator
    pub fn state<T: AccountDeserialize>(&self, key: &Pubkey) -> T {
        let stored = self.account(key).expect("account exists");
        T::try_deserialize(&mut &stored.data[..]).unwrap()
    }

    /// Run one instruction through the cellar entrypoint, keeping writes
    /// only when it succeeds
    pub fn process(&mut self, instruction: &Instruction) -> std::result::Result<(), ProgramError> {
        let mut infos: Vec<AccountInfo<'static>> = Vec::with_capacity(instruction.accounts.len());
        let mut first_seen: HashMap<Pubkey, usize> = HashMap::new();
        for meta in &instruction.accounts {
            if let Some(&index) = first_seen.get(&meta.pubkey) {
                let shared = infos[index].clone();
                infos.push(shared);
                continue;
            }
            let metas = instruction.accounts.iter().filter(|m| m.pubkey == meta.pubkey);
            let is_signer = metas.clone().any(|m| m.is_signer);
            let is_writable = metas.clone().any(|m| m.is_writable);
            let stored = self.accounts.get(&meta.pubkey).cloned().unwrap_or_default();

            first_seen.insert(meta.pubkey, infos.len());
            infos.push(AccountInfo::new(
                Box::leak(Box::new(meta.pubkey)),
                is_signer,
                is_writable,
                Box::leak(Box::new(stored.lamports)),
                Box::leak(stored.data.into_boxed_slice()),
                Box::leak(Box::new(stored.owner)),
                stored.executable,
                0,
            ));
        }
        let infos: &'static [AccountInfo<'static>] = Box::leak(infos.into_boxed_slice());

        run_as(::cellar::ID, || {
            ::cellar::entry(&::cellar::ID, infos, &instruction.data)
        })?;

        for &index in first_seen.values() {
            let info = &infos[index];
            if !info.is_writable {
                continue;
            }
            self.accounts.insert(
                *info.key,
                StoredAccount {
                    lamports: info.lamports(),
                    data: info.data.borrow().to_vec(),
                    owner: *info.owner,
                    executable: info.executable,
                },
            );
        }
        Ok(())
    }
}
