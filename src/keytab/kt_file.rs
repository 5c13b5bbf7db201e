#![allow(unused_assignments)]
use crate::asn1::constants::PrincipalNameType;
use crate::error::KrbError;
use crate::keytab::{Keytab, KeytabEntry};
use crate::proto::{EncryptionKey, Principal as KrbPrincipal};
use binrw::helpers::until_eof;
use binrw::io::{SeekFrom, TakeSeekExt};
use binrw::BinReaderExt;
use binrw::{binread, binwrite, BinWrite};
use std::fmt;
use std::fs::File;
use std::io::Read;
use tracing::{debug, error};

#[binwrite]
#[brw(big)]
#[binread]
#[derive(Debug, Clone, PartialEq, Eq)]
struct Data {
    #[br(temp)]
    #[bw(try_calc(u16::try_from(value.len())))]
    value_len: u16,
    #[br(count = value_len)]
    value: Vec<u8>,
}

impl Data {
    fn from_text(s: &str) -> Self {
        Data {
            value: s.as_bytes().to_vec(),
        }
    }

    fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.value).to_string()
    }
}

#[binwrite]
#[brw(big)]
#[derive(Clone, PartialEq, Eq)]
#[binread]
#[br(import { version: u8 })]
struct Principal {
    #[br(temp)]
    #[bw(try_calc(u16::try_from(components.len())))]
    components_count: u16,
    realm: Data,
    // Version 1 counts the realm as a component.
    #[br(count = if version == 1 { components_count.saturating_sub(1) } else { components_count })]
    components: Vec<Data>,
    #[br(if(version > 1))]
    name_type: Option<u32>,
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c: Vec<_> = self.components.iter().map(Data::to_string_lossy).collect();
        f.debug_struct("Principal")
            .field("components", &c)
            .field("realm", &self.realm.to_string_lossy())
            .field("name_type", &self.name_type)
            .finish()
    }
}

impl From<&KrbPrincipal> for Principal {
    fn from(value: &KrbPrincipal) -> Self {
        let name_type: i32 = value.name_type().into();
        Principal {
            realm: Data::from_text(value.realm()),
            components: value
                .components()
                .iter()
                .map(|c| Data::from_text(c))
                .collect(),
            name_type: Some(name_type as u32),
        }
    }
}

impl TryFrom<&Principal> for KrbPrincipal {
    type Error = KrbError;

    fn try_from(value: &Principal) -> Result<Self, Self::Error> {
        let components: Vec<String> = value.components.iter().map(Data::to_string_lossy).collect();
        let principal = KrbPrincipal::new(components, &value.realm.to_string_lossy())?;

        let name_type = value
            .name_type
            .and_then(|nt| i32::try_from(nt).ok())
            .and_then(|nt| PrincipalNameType::try_from(nt).ok());

        Ok(match name_type {
            Some(nt) => principal.with_name_type(nt),
            None => principal,
        })
    }
}

#[binwrite]
#[brw(big)]
#[derive(Debug, Clone, PartialEq, Eq)]
#[binread]
#[br(import { version: u8, rlen: i32 })]
enum RecordData {
    #[br(pre_assert(rlen > 0))]
    Entry {
        #[br(args { version })]
        principal: Principal,
        timestamp: u32,
        key_version_u8: u8,
        enctype: u16,
        key: Data,
        // MIT 1.14 and later append the full kvno when there is room left in the record.
        #[br(try)]
        key_version_u32: Option<u32>,
    },
    // A negative length marks an entry that was deleted in place. The hole is as long as
    // the inverse of the record length.
    #[br(pre_assert(rlen <= 0))]
    Hole {
        #[br(count = rlen.abs())]
        pad: Vec<u8>,
    },
}

impl TryFrom<&KeytabEntry> for RecordData {
    type Error = KrbError;

    fn try_from(value: &KeytabEntry) -> Result<Self, Self::Error> {
        let enctype = u16::try_from(value.key.etype()).map_err(|_| {
            error!(etype = %value.key.etype(), "encryption type does not fit a keytab entry");
            KrbError::UnsupportedEncryption
        })?;

        Ok(RecordData::Entry {
            principal: (&value.principal).into(),
            timestamp: value.timestamp,
            // The 8 bit field only keeps the low byte, the 32 bit one is authoritative.
            key_version_u8: (value.kvno & 0xff) as u8,
            enctype,
            key: Data {
                value: value.key.as_bytes().to_vec(),
            },
            key_version_u32: Some(value.kvno),
        })
    }
}

impl TryFrom<&RecordData> for Option<KeytabEntry> {
    type Error = KrbError;

    fn try_from(value: &RecordData) -> Result<Self, Self::Error> {
        match value {
            RecordData::Hole { .. } => Ok(None),
            RecordData::Entry {
                principal,
                timestamp,
                key_version_u8,
                enctype,
                key,
                key_version_u32,
            } => {
                let kvno = match key_version_u32 {
                    Some(v) if *v != 0 => *v,
                    _ => *key_version_u8 as u32,
                };
                Ok(Some(KeytabEntry {
                    principal: principal.try_into()?,
                    kvno,
                    key: EncryptionKey::new(*enctype as i32, &key.value)?,
                    timestamp: *timestamp,
                }))
            }
        }
    }
}

// The record length is only known once the record is written, so seek back to fill it.
#[binrw::writer(writer, endian)]
fn write_rdata(rdata: &RecordData) -> binrw::BinResult<()> {
    let start = writer.stream_position()?;
    rdata.write_options(writer, endian, ())?;
    let end = writer.stream_position()?;
    let rlen: i32 = end as i32 - start as i32;

    writer.seek(SeekFrom::Start(start - 4))?;
    rlen.write_options(writer, endian, ())?;
    writer.seek(SeekFrom::Start(end))?;
    Ok(())
}

#[binwrite]
#[brw(big)]
#[derive(Debug, Clone, PartialEq, Eq)]
#[binread]
#[br(import { version: u8 })]
struct Record {
    #[br(temp)]
    #[bw(if (matches!(rdata, RecordData::Entry { .. })), calc = 0)]
    // Written as 0 first, write_rdata fills it in.
    rlen: i32,
    #[br(map_stream = |s| s.take_seek(rlen.unsigned_abs() as u64), args { version, rlen })]
    #[bw(if (matches!(rdata, RecordData::Entry { .. })), write_with = write_rdata)]
    rdata: RecordData,
}

#[binread]
#[binwrite]
#[brw(big)]
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileKeytabV2 {
    #[br(parse_with = until_eof, args { version: 2 })]
    records: Vec<Record>,
}

#[binread]
#[binwrite]
#[brw(big, magic = 5u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileKeytab {
    #[brw(magic = 2u8)]
    V2(FileKeytabV2),
}

impl TryFrom<&Keytab> for FileKeytab {
    type Error = KrbError;

    fn try_from(value: &Keytab) -> Result<Self, Self::Error> {
        let records = value
            .iter()
            .map(|entry| RecordData::try_from(entry).map(|rdata| Record { rdata }))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FileKeytab::V2(FileKeytabV2 { records }))
    }
}

impl TryFrom<&FileKeytab> for Keytab {
    type Error = KrbError;

    fn try_from(value: &FileKeytab) -> Result<Self, Self::Error> {
        let FileKeytab::V2(v2) = value;
        let mut entries: Keytab = Vec::with_capacity(v2.records.len());
        for record in &v2.records {
            let entry: Option<KeytabEntry> = (&record.rdata).try_into()?;
            if let Some(e) = entry {
                entries.push(e);
            }
        }
        debug!(entries = %entries.len(), "keytab parsed");
        Ok(entries)
    }
}

fn read(buffer: &[u8]) -> Result<FileKeytab, KrbError> {
    let mut reader = binrw::io::Cursor::new(buffer);
    reader.read_type(binrw::Endian::Big).map_err(|err| {
        error!(?err, "Failed to unmarshall keytab buffer");
        KrbError::KeytabFileError
    })
}

pub(super) fn store(kt_name: &str, kt: &Keytab) -> Result<(), KrbError> {
    let path = kt_name
        .strip_prefix("FILE:")
        .ok_or(KrbError::UnsupportedKeytabType)?;

    let fk = FileKeytab::try_from(kt)?;

    let mut f = File::create(path).map_err(|io_err| {
        error!(?io_err, "Unable to create file at {}", path);
        KrbError::KeytabFileError
    })?;

    fk.write(&mut f).map_err(|binrw_err| {
        error!(?binrw_err, "Unable to write binary data.");
        KrbError::KeytabFileError
    })
}

pub(super) fn load(kt_name: &str) -> Result<Keytab, KrbError> {
    let path = kt_name
        .strip_prefix("FILE:")
        .ok_or(KrbError::UnsupportedKeytabType)?;

    let mut f = File::open(path).map_err(|io_err| {
        error!(?io_err, "Unable to open file at {}", path);
        KrbError::KeytabFileError
    })?;

    let mut buffer = Vec::new();
    f.read_to_end(&mut buffer).map_err(|io_err| {
        error!(?io_err, "Unable to read file at {}", path);
        KrbError::KeytabFileError
    })?;

    let fk = read(&buffer)?;
    Keytab::try_from(&fk)
}
