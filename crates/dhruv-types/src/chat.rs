//! Chat and account enums.

use crate::string_enum;

string_enum! {
    /// Who can read a chat.
    Visibility, "visibility", default = Private {
        Public => "public",
        Private => "private",
    }
}

string_enum! {
    /// Author of a persisted chat message.
    ChatRole, "role", default = User {
        User => "user",
        Assistant => "assistant",
    }
}

string_enum! {
    /// Account kind, which selects the daily message entitlement.
    UserKind, "user kind", default = Regular {
        Regular => "regular",
        Guest => "guest",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_defaults_to_private() {
        assert_eq!(Visibility::default(), Visibility::Private);
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in ChatRole::ALL {
            assert_eq!(role.as_str().parse::<ChatRole>().unwrap(), *role);
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = "admin".parse::<UserKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown user kind 'admin'");
    }
}
