//! Windows Credential Manager vault
//!
//! Generic credentials addressed by their target name. Enumeration uses
//! `CredEnumerateW` with a `prefix*` filter, which is also how wildcard
//! removal finds its victims.

use async_trait::async_trait;
use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::ptr;
use tracing::debug;
use winapi::shared::winerror::ERROR_NOT_FOUND;
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::wincred::{
    CredDeleteW, CredEnumerateW, CredFree, CredWriteW, CREDENTIALW, CRED_MAX_CREDENTIAL_BLOB_SIZE,
    CRED_PERSIST_LOCAL_MACHINE, CRED_TYPE_GENERIC, PCREDENTIALW,
};

use super::{blocking_stream, run_blocking, RecordStream, VaultApi, VaultRecord, TARGET_WILDCARD};
use crate::error::{CredentialError, Result};

/// Prefix Windows sometimes puts in front of generic credential targets
const LEGACY_TARGET_PREFIX: &str = "LegacyGeneric:target=";

/// Windows Credential Manager
pub struct WindowsVault;

impl WindowsVault {
    pub fn new() -> Self {
        WindowsVault
    }
}

impl Default for WindowsVault {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VaultApi for WindowsVault {
    fn list(&self, filter: Option<&str>) -> RecordStream<VaultRecord> {
        let filter = filter.map(|f| format!("{}{}", f, TARGET_WILDCARD));
        blocking_stream(move |emit| {
            for record in enumerate(filter.as_deref())? {
                if !emit(record) {
                    break;
                }
            }
            Ok(())
        })
    }

    async fn write(&self, target: &str, secret: &[u8]) -> Result<()> {
        if secret.len() > CRED_MAX_CREDENTIAL_BLOB_SIZE as usize {
            return Err(CredentialError::VaultError(format!(
                "Secret too long ({} bytes, max {})",
                secret.len(),
                CRED_MAX_CREDENTIAL_BLOB_SIZE
            )));
        }

        let target = target.to_string();
        let secret = secret.to_vec();
        run_blocking(move || write_generic(&target, &secret)).await
    }

    async fn remove(&self, target: &str) -> Result<()> {
        let target = target.to_string();
        run_blocking(move || {
            if target.ends_with(TARGET_WILDCARD) {
                let matches = enumerate(Some(&target))?;
                if matches.is_empty() {
                    return Err(CredentialError::NotFound(target));
                }
                for record in matches {
                    match delete_generic(&record.target_name) {
                        Err(e) if e.is_not_found() => {}
                        other => other?,
                    }
                }
                debug!("Removed vault targets matching {}", target);
                Ok(())
            } else {
                delete_generic(&target)
            }
        })
        .await
    }

    fn name(&self) -> &'static str {
        "Windows Credential Manager"
    }
}

fn to_wide_string(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(Some(0)).collect()
}

fn from_wide_ptr(ptr: *const u16) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe {
        let len = (0..).take_while(|&i| *ptr.offset(i) != 0).count();
        let slice = std::slice::from_raw_parts(ptr, len);
        String::from_utf16_lossy(slice)
    }
}

fn last_error(action: &str) -> CredentialError {
    let code = unsafe { GetLastError() };
    if code == ERROR_NOT_FOUND {
        CredentialError::NotFound(action.to_string())
    } else {
        CredentialError::VaultError(format!("{} failed, error code: {}", action, code))
    }
}

/// Generic credentials matching `filter` (a `prefix*` pattern)
fn enumerate(filter: Option<&str>) -> Result<Vec<VaultRecord>> {
    let filter_wide = filter.map(to_wide_string);
    let filter_ptr = filter_wide.as_ref().map_or(ptr::null(), |f| f.as_ptr());
    let mut records = Vec::new();

    unsafe {
        let mut count: u32 = 0;
        let mut cred_array: *mut PCREDENTIALW = ptr::null_mut();

        if CredEnumerateW(filter_ptr, 0, &mut count, &mut cred_array) == 0 {
            return match last_error("CredEnumerateW") {
                e if e.is_not_found() => Ok(records),
                e => Err(e),
            };
        }

        for i in 0..count as isize {
            let cred = *cred_array.offset(i);
            if cred.is_null() {
                continue;
            }
            let cred_ref = &*cred;
            if cred_ref.Type != CRED_TYPE_GENERIC {
                continue;
            }

            let target_name = from_wide_ptr(cred_ref.TargetName);
            let target_name = target_name
                .strip_prefix(LEGACY_TARGET_PREFIX)
                .map(str::to_string)
                .unwrap_or(target_name);

            let blob = if cred_ref.CredentialBlob.is_null() {
                &[][..]
            } else {
                std::slice::from_raw_parts(cred_ref.CredentialBlob, cred_ref.CredentialBlobSize as usize)
            };

            records.push(VaultRecord {
                target_name,
                credential: hex::encode(blob),
            });
        }

        if !cred_array.is_null() {
            CredFree(cred_array as *mut _);
        }
    }

    Ok(records)
}

fn write_generic(target: &str, secret: &[u8]) -> Result<()> {
    let target_wide = to_wide_string(target);

    unsafe {
        let mut cred = CREDENTIALW {
            Flags: 0,
            Type: CRED_TYPE_GENERIC,
            TargetName: target_wide.as_ptr() as *mut _,
            Comment: ptr::null_mut(),
            LastWritten: std::mem::zeroed(),
            CredentialBlobSize: secret.len() as u32,
            CredentialBlob: secret.as_ptr() as *mut _,
            Persist: CRED_PERSIST_LOCAL_MACHINE,
            AttributeCount: 0,
            Attributes: ptr::null_mut(),
            TargetAlias: ptr::null_mut(),
            UserName: ptr::null_mut(),
        };

        if CredWriteW(&mut cred, 0) == 0 {
            return Err(last_error("CredWriteW"));
        }
    }

    Ok(())
}

fn delete_generic(target: &str) -> Result<()> {
    let target_wide = to_wide_string(target);

    unsafe {
        if CredDeleteW(target_wide.as_ptr(), CRED_TYPE_GENERIC, 0) == 0 {
            return Err(last_error("CredDeleteW"));
        }
    }

    Ok(())
}
