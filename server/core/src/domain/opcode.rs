// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Operation codes and minor-version dialects
//!
//! NFSv4.0 defines op codes 3..=39; NFSv4.1 extends the range to 58. Both
//! dialects share one descriptor table and differ only in their legal range.
//! Codes 0..=2 are reserved by the protocol and never name an operation.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opcodes {
    ($($variant:ident = $value:expr => $name:literal,)+) => {
        /// NFSv4 operation code (`nfs_opnum4`)
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(u32)]
        pub enum OpCode {
            $($variant = $value,)+
        }

        impl OpCode {
            /// Every op code in ascending numeric order
            pub const ALL: &'static [OpCode] = &[$(OpCode::$variant,)+];

            pub fn from_u32(value: u32) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Diagnostic name, e.g. `"OP_PUTFH"`
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }
    };
}

opcodes! {
    Access = 3 => "OP_ACCESS",
    Close = 4 => "OP_CLOSE",
    Commit = 5 => "OP_COMMIT",
    Create = 6 => "OP_CREATE",
    Delegpurge = 7 => "OP_DELEGPURGE",
    Delegreturn = 8 => "OP_DELEGRETURN",
    Getattr = 9 => "OP_GETATTR",
    Getfh = 10 => "OP_GETFH",
    Link = 11 => "OP_LINK",
    Lock = 12 => "OP_LOCK",
    Lockt = 13 => "OP_LOCKT",
    Locku = 14 => "OP_LOCKU",
    Lookup = 15 => "OP_LOOKUP",
    Lookupp = 16 => "OP_LOOKUPP",
    Nverify = 17 => "OP_NVERIFY",
    Open = 18 => "OP_OPEN",
    Openattr = 19 => "OP_OPENATTR",
    OpenConfirm = 20 => "OP_OPEN_CONFIRM",
    OpenDowngrade = 21 => "OP_OPEN_DOWNGRADE",
    Putfh = 22 => "OP_PUTFH",
    Putpubfh = 23 => "OP_PUTPUBFH",
    Putrootfh = 24 => "OP_PUTROOTFH",
    Read = 25 => "OP_READ",
    Readdir = 26 => "OP_READDIR",
    Readlink = 27 => "OP_READLINK",
    Remove = 28 => "OP_REMOVE",
    Rename = 29 => "OP_RENAME",
    Renew = 30 => "OP_RENEW",
    Restorefh = 31 => "OP_RESTOREFH",
    Savefh = 32 => "OP_SAVEFH",
    Secinfo = 33 => "OP_SECINFO",
    Setattr = 34 => "OP_SETATTR",
    Setclientid = 35 => "OP_SETCLIENTID",
    SetclientidConfirm = 36 => "OP_SETCLIENTID_CONFIRM",
    Verify = 37 => "OP_VERIFY",
    Write = 38 => "OP_WRITE",
    ReleaseLockowner = 39 => "OP_RELEASE_LOCKOWNER",
    BackchannelCtl = 40 => "OP_BACKCHANNEL_CTL",
    BindConnToSession = 41 => "OP_BIND_CONN_TO_SESSION",
    ExchangeId = 42 => "OP_EXCHANGE_ID",
    CreateSession = 43 => "OP_CREATE_SESSION",
    DestroySession = 44 => "OP_DESTROY_SESSION",
    FreeStateid = 45 => "OP_FREE_STATEID",
    GetDirDelegation = 46 => "OP_GET_DIR_DELEGATION",
    Getdeviceinfo = 47 => "OP_GETDEVICEINFO",
    Getdevicelist = 48 => "OP_GETDEVICELIST",
    Layoutcommit = 49 => "OP_LAYOUTCOMMIT",
    Layoutget = 50 => "OP_LAYOUTGET",
    Layoutreturn = 51 => "OP_LAYOUTRETURN",
    SecinfoNoName = 52 => "OP_SECINFO_NO_NAME",
    Sequence = 53 => "OP_SEQUENCE",
    SetSsv = 54 => "OP_SET_SSV",
    TestStateid = 55 => "OP_TEST_STATEID",
    WantDelegation = 56 => "OP_WANT_DELEGATION",
    DestroyClientid = 57 => "OP_DESTROY_CLIENTID",
    ReclaimComplete = 58 => "OP_RECLAIM_COMPLETE",
    Illegal = 10044 => "OP_ILLEGAL",
}

impl OpCode {
    /// Lowest op code the protocol assigns
    pub const FIRST: u32 = OpCode::Access as u32;
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Protocol minor version accepted by the compound engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinorVersion {
    V40,
    V41,
}

impl MinorVersion {
    /// Highest op code legal in this dialect
    pub fn last_op(self) -> OpCode {
        match self {
            MinorVersion::V40 => OpCode::ReleaseLockowner,
            MinorVersion::V41 => OpCode::ReclaimComplete,
        }
    }

    /// Whether `raw` falls inside this dialect's legal op-code range
    pub fn is_legal(self, raw: u32) -> bool {
        (OpCode::FIRST..=self.last_op() as u32).contains(&raw)
    }

    pub fn as_u32(self) -> u32 {
        match self {
            MinorVersion::V40 => 0,
            MinorVersion::V41 => 1,
        }
    }
}

impl TryFrom<u32> for MinorVersion {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MinorVersion::V40),
            1 => Ok(MinorVersion::V41),
            other => Err(other),
        }
    }
}
