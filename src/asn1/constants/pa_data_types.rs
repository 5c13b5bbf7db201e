use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum PaDataType {
    PaTgsReq = 1,
    PaEncTimestamp = 2,
    PaPwSalt = 3,
    PaEtypeInfo2 = 19, // (replaces pa-etype-info)
    PaPacRequest = 128, // Include Windows PAC
    PaForUser = 129,    // MS-SFU S4U2Self impersonation
    PaS4uX509User = 130,
    PaFxFast = 136,     // RFC6113 FAST
    PaPacOptions = 167, // MS-KILE resource based delegation
}
