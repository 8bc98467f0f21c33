use crate::context::PolicyContext;

macro_rules! request_flags {
    ($(
        $(#[$doc:meta])*
        $field:ident: $getter:ident / $setter:ident;
    )*) => {
        /// Boolean request state shared by every context of a request.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub(crate) struct RequestFlags {
            $(pub(crate) $field: bool,)*
        }

        impl PolicyContext {
            $(
                $(#[$doc])*
                pub fn $getter(&self) -> bool {
                    self.shared.flags.get().$field
                }

                #[doc = concat!("Sets the flag read by [`", stringify!($getter), "`](Self::", stringify!($getter), ").")]
                pub fn $setter(&self, value: bool) {
                    self.shared.update_flags(|flags| flags.$field = value);
                }
            )*
        }
    };
}

request_flags! {
    /// Whether the client waits for a response.
    reply_expected: is_reply_expected / set_reply_expected;
    /// Whether the request body is saved with the audit record.
    audit_save_request: is_audit_save_request / set_audit_save_request;
    /// Whether the response body is saved with the audit record.
    audit_save_response: is_audit_save_response / set_audit_save_response;
    /// Whether the request violated the policy it was checked against.
    policy_violated: is_policy_violated / set_policy_violated;
    /// Whether the client presented an outdated policy version.
    wrong_policy_version: is_requestor_claiming_wrong_policy_version / set_requestor_claiming_wrong_policy_version;
    /// Whether the request could not be parsed.
    malformed_request: is_malformed_request / set_malformed_request;
    /// Whether the request body arrived compressed.
    compressed_request: is_compressed_request / set_compressed_request;
    /// Whether the response should use WS-Security 1.1.
    response_wss11: is_response_wss11 / set_response_wss11;
    /// Whether any assertion of the policy has started executing.
    policy_execution_attempted: is_policy_execution_attempted / set_policy_execution_attempted;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_default_to_false() {
        let flags = RequestFlags::default();
        assert!(!flags.reply_expected);
        assert!(!flags.policy_execution_attempted);
    }
}
