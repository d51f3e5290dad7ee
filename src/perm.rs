//! Permission checker: decides r/w/x access for the current principal.

use crate::inode::Inode;
use crate::user::Principal;

/// A requested access bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Execute,
}

impl Access {
    fn bit(self) -> u16 {
        match self {
            Self::Read => 0o4,
            Self::Write => 0o2,
            Self::Execute => 0o1,
        }
    }
}

/// Returns whether `principal` (optionally elevated via `is_sudo`) may
/// access `inode` with the given `access` bit.
pub fn check(principal: Option<&Principal>, is_sudo: bool, inode: &Inode, access: Access) -> bool {
    let Some(principal) = principal else {
        return false;
    };
    if principal.uid == 0 || is_sudo {
        return true;
    }
    inode.perm_octet_for(principal.uid) & access.bit() != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(uid: u32) -> Principal {
        Principal {
            uid,
            username: "x".into(),
        }
    }

    #[test]
    fn owner_vs_other_octet() {
        let inode = Inode::new_file(5, 1, 0o640);
        assert!(check(Some(&principal(1)), false, &inode, Access::Write));
        assert!(!check(Some(&principal(2)), false, &inode, Access::Write));
        assert!(!check(Some(&principal(2)), false, &inode, Access::Read));
    }

    #[test]
    fn no_principal_denies() {
        let inode = Inode::new_file(5, 1, 0o777);
        assert!(!check(None, false, &inode, Access::Read));
    }

    #[test]
    fn admin_and_sudo_bypass() {
        let inode = Inode::new_file(5, 1, 0o000);
        assert!(check(Some(&principal(0)), false, &inode, Access::Write));
        assert!(check(Some(&principal(2)), true, &inode, Access::Write));
    }
}
