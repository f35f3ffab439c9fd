// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod csr;
pub mod registers;
pub mod riscv;

pub use csr::{CsrBank, CsrInput, CsrOp};
pub use registers::{RegisterFile, RegisterWrite};
pub use riscv::{RiscV, StepOutcome, TrapCause};
