use super::checksum::Checksum;
use super::kerberos_string::KerberosString;
use super::principal_name::PrincipalName;
use super::realm::Realm;
use der::Sequence;

/// MS-SFU 2.2.1
///
/// ```text
/// PA-FOR-USER ::= SEQUENCE {
///         -- PA TYPE 129
///         userName                [0] PrincipalName,
///         userRealm               [1] Realm,
///         cksum                   [2] Checksum,
///         auth-package            [3] KerberosString
/// }
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Sequence)]
pub(crate) struct PaForUser {
    #[asn1(context_specific = "0")]
    pub(crate) user_name: PrincipalName,
    #[asn1(context_specific = "1")]
    pub(crate) user_realm: Realm,
    #[asn1(context_specific = "2")]
    pub(crate) cksum: Checksum,
    #[asn1(context_specific = "3")]
    pub(crate) auth_package: KerberosString,
}

impl PaForUser {
    /// The bytes covered by the checksum: the name type as a little endian integer,
    /// then each name component, the realm and the auth package, without separators.
    pub(crate) fn checksum_data(
        user_name: &PrincipalName,
        user_realm: &Realm,
        auth_package: &KerberosString,
    ) -> Vec<u8> {
        let mut data = user_name.name_type.to_le_bytes().to_vec();
        for component in user_name.name_string.iter() {
            data.extend_from_slice(component.as_str().as_bytes());
        }
        data.extend_from_slice(user_realm.as_str().as_bytes());
        data.extend_from_slice(auth_package.as_str().as_bytes());
        data
    }
}

#[cfg(test)]
mod tests {
    use super::PaForUser;
    use crate::asn1::kerberos_string::KerberosString;
    use crate::asn1::principal_name::PrincipalName;
    use std::str::FromStr;

    #[test]
    fn pa_for_user_checksum_data() {
        let user_name = PrincipalName {
            name_type: 1,
            name_string: vec![KerberosString::from_str("alice").expect("Invalid name")],
        };
        let realm = KerberosString::from_str("EXAMPLE.COM").expect("Invalid realm");
        let package = KerberosString::from_str("Kerberos").expect("Invalid package");

        let data = PaForUser::checksum_data(&user_name, &realm, &package);
        assert_eq!(&data[..4], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(&data[4..], b"aliceEXAMPLE.COMKerberos");
    }
}
