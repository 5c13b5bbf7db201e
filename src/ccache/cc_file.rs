use super::{CredentialV4, PrincipalV4};
use crate::error::KrbError;
use binrw::helpers::until_eof;
use binrw::io::TakeSeekExt;
use binrw::BinReaderExt;
use binrw::BinWrite;
use binrw::{binread, binwrite};
use std::fs::{self, Permissions};
use std::io::{BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, error};

#[binwrite]
#[bw(big)]
#[binread]
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderField {
    tag: u16,
    #[bw(try_calc(u16::try_from(value.len())))]
    value_len: u16,
    #[br(count = value_len)]
    value: Vec<u8>,
}

#[binwrite]
#[bw(big)]
#[binread]
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileCredentialCacheHeader {
    #[bw(calc = fields.iter().map(|x| (x.value.len() + 4) as u16).sum::<u16>())]
    length: u16,
    #[br(map_stream = |s| s.take_seek(length as u64), parse_with = until_eof)]
    fields: Vec<HeaderField>,
}

impl FileCredentialCacheHeader {
    fn new(clock_skew: Option<Duration>) -> Self {
        let mut fields = vec![];

        // Tag 1 is the only defined field: the seconds and microseconds the KDC clock is
        // ahead of ours, as two 32 bit integers.
        if let Some(skew) = clock_skew {
            let mut value = Vec::with_capacity(8);
            value.extend_from_slice(&(skew.as_secs() as u32).to_be_bytes());
            value.extend_from_slice(&skew.subsec_micros().to_be_bytes());
            fields.push(HeaderField { tag: 1u16, value });
        }

        FileCredentialCacheHeader { fields }
    }
}

#[binwrite]
#[bw(big, magic = 4u8)]
#[binread]
#[br(magic = 4u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileCredentialCacheV4 {
    header: FileCredentialCacheHeader,
    principal: PrincipalV4,
    #[br(parse_with = until_eof)]
    credentials: Vec<CredentialV4>,
}

#[binwrite]
#[bw(big, magic = 5u8)]
#[binread]
#[br(magic = 5u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileCredentialCache {
    V4(FileCredentialCacheV4),
}

impl FileCredentialCache {
    fn read(inner: &[u8]) -> Result<Self, KrbError> {
        let mut reader = binrw::io::Cursor::new(inner);
        reader.read_type(binrw::Endian::Big).map_err(|e| {
            debug!(?e, "Failed to deserialize credential cache");
            KrbError::CredentialCacheRead
        })
    }
}

pub(super) fn store(
    path: &Path,
    principal: PrincipalV4,
    credential: CredentialV4,
    clock_skew: Option<Duration>,
) -> Result<(), KrbError> {
    let fcc = FileCredentialCache::V4(FileCredentialCacheV4 {
        header: FileCredentialCacheHeader::new(clock_skew),
        principal,
        credentials: vec![credential],
    });

    // The temporary file must be on the same filesystem for the rename to be atomic.
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let tmp = NamedTempFile::new_in(dir).map_err(|io_err| {
        error!(?io_err, "Unable to create temporary file in {:#?}", dir);
        KrbError::CredentialCacheWrite
    })?;

    tmp.as_file()
        .set_permissions(Permissions::from_mode(0o600))
        .map_err(|io_err| {
            error!(?io_err, "Unable to set permissions at {:#?}", tmp.path());
            KrbError::CredentialCacheWrite
        })?;

    {
        let mut writer = BufWriter::new(tmp.as_file());
        fcc.write(&mut writer).map_err(|binrw_err| {
            error!(?binrw_err, "Unable to write binary data.");
            KrbError::CredentialCacheWrite
        })?;
        writer.flush().map_err(|io_err| {
            error!(?io_err, "Unable to flush {:#?}", tmp.path());
            KrbError::CredentialCacheWrite
        })?;
    }

    tmp.as_file().sync_all().map_err(|io_err| {
        error!(?io_err, "Unable to sync {:#?}", tmp.path());
        KrbError::CredentialCacheWrite
    })?;

    tmp.persist(path).map_err(|persist_err| {
        error!(?persist_err, "Unable to move credential cache to {:#?}", path);
        KrbError::CredentialCacheWrite
    })?;

    debug!(?path, "credential cache written");
    Ok(())
}

pub(super) fn load(path: &Path) -> Result<Vec<CredentialV4>, KrbError> {
    let buffer = fs::read(path).map_err(|io_err| {
        error!(?io_err, "Unable to read file at {:#?}", path);
        KrbError::CredentialCacheRead
    })?;

    let FileCredentialCache::V4(v4) = FileCredentialCache::read(&buffer)?;
    Ok(v4.credentials)
}
