use std::cell::{Cell, RefCell};
use std::rc::Rc;

use policy_context::audit::{AuditEventKind, AuditTrail};
use policy_context::{
    AssertionRef, AssertionStatus, AuthenticationResult, ContentType, ContextConfig,
    ContextFactory, ContextKind, CredentialFormat, Error, LoginCredentials, Message, MessageTarget,
    RoutingStatus, SecurityToken, SecurityTokenKind, User, Value, VariableBacked,
};

fn factory() -> ContextFactory {
    ContextFactory::default()
}

#[test]
fn child_delegates_request_state_to_parent() {
    let factory = factory();
    let root = factory.create_root_context(Message::new(), Message::new(), true);
    let result_a = Rc::new(AuthenticationResult::new(User::new("1", "alice", "idp1")));
    root.add_authentication_result(Rc::clone(&result_a), Some("idp1"));
    root.set_variable("caller", "gateway").unwrap();

    let child = factory.create_child_context(&root);
    child.set_routing_status(RoutingStatus::Attempted);
    assert_eq!(root.routing_status(), RoutingStatus::Attempted);

    let found = root
        .default_authentication_context()
        .authentication_result_for_tag("idp1")
        .unwrap();
    assert!(Rc::ptr_eq(&found, &result_a));
    assert!(Rc::ptr_eq(
        &child.default_authentication_context(),
        &root.default_authentication_context()
    ));

    child.close();
    assert!(child.is_closed());
    assert!(!root.is_closed());
    assert_eq!(root.get_variable("caller").unwrap(), Value::from("gateway"));
    assert_eq!(root.variable_names(), vec!["caller".to_string()]);
    assert_eq!(
        root.default_authentication_context().all_authentication_results().len(),
        1
    );
    assert!(root.request().borrow().body_bytes().is_ok());
}

#[test]
fn routing_status_set_on_parent_is_seen_by_child() {
    let factory = factory();
    let root = factory.create_root_context(Message::new(), Message::new(), true);
    let child = factory.create_child_context(&root);

    root.set_routing_status(RoutingStatus::Routed);
    assert_eq!(child.routing_status(), RoutingStatus::Routed);
    assert!(child.is_post_routing());
}

#[test]
fn child_variables_are_hidden_unless_passed_through() {
    let factory = factory();
    let root = factory.create_root_context(Message::new(), Message::new(), true);
    let child = factory.create_child_context(&root);

    child.set_variable("local", 1i64).unwrap();
    assert!(root.get_variable("local").unwrap_err().is_not_found());

    child.pass_variable_to_parent("exported", false);
    child.set_variable("Exported", 2i64).unwrap();
    assert_eq!(root.get_variable("exported").unwrap(), Value::Integer(2));
}

#[test]
fn singleton_list_variable_materializes_as_message() {
    let ctx = factory().create_root_context(Message::new(), Message::new(), true);
    ctx.set_variable("foo", Value::from(vec!["bar"])).unwrap();
    let target = MessageTarget::Variable("foo".into());

    let message = ctx.get_or_create_target_message(&target, true).unwrap();
    assert_eq!(message.borrow().body_text().unwrap(), "bar");
    assert!(message.borrow().knob::<VariableBacked>().is_some());

    let err = ctx.get_or_create_target_message(&target, false).unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, Error::NotAMessage { .. }));
}

#[test]
fn modified_message_body_is_written_back() {
    let ctx = factory().create_root_context(Message::new(), Message::new(), true);
    ctx.set_variable("doc", "<a/>").unwrap();
    let target = MessageTarget::Variable("doc".into());
    let message = ctx.get_or_create_target_message(&target, true).unwrap();

    message.borrow_mut().set_body(b"<b/>".to_vec()).unwrap();
    assert_eq!(ctx.get_variable("doc").unwrap(), Value::from("<b/>"));

    message
        .borrow_mut()
        .initialize(ContentType::parse("text/xml; charset=us-ascii").unwrap(), b"<c/>".to_vec())
        .unwrap();
    assert_eq!(ctx.get_variable("doc").unwrap(), Value::from("<c/>"));
}

#[test]
fn ledger_tracks_tags_and_last_result() {
    let ctx = factory().create_root_context(Message::new(), Message::new(), true);
    let ledger = ctx.default_authentication_context();
    assert!(!ledger.is_authenticated());

    let a = Rc::new(AuthenticationResult::new(User::new("1", "alice", "ldap")));
    let b = Rc::new(AuthenticationResult::new(User::new("2", "bob", "saml")));
    ledger.add_authentication_result(Rc::clone(&a), None);
    ledger.add_authentication_result(Rc::clone(&b), Some("partner"));
    ledger.add_authentication_result(Rc::clone(&a), None);

    assert!(ledger.is_authenticated());
    assert_eq!(ledger.all_authentication_results().len(), 2);
    assert_eq!(ledger.untagged_authentication_results().len(), 1);
    assert!(Rc::ptr_eq(&ledger.last_authentication_result().unwrap(), &a));
    assert!(ledger.authentication_result_for_tag("missing").is_none());
    assert_eq!(ctx.get_variable("request.authenticated").unwrap(), Value::Boolean(true));
    assert_eq!(
        ctx.get_variable("request.authenticatedUser").unwrap(),
        Value::from("alice")
    );
}

#[test]
fn security_token_lookup_binds_to_the_exact_token() {
    let ctx = factory().create_root_context(Message::new(), Message::new(), true);
    let ledger = ctx.default_authentication_context();
    let token = Rc::new(SecurityToken::new(SecurityTokenKind::X509, b"sig-1".to_vec()));
    let other = SecurityToken::new(SecurityTokenKind::X509, b"sig-2".to_vec());

    let result = Rc::new(
        AuthenticationResult::new(User::new("1", "alice", "pki"))
            .with_security_token(Rc::clone(&token)),
    );
    ledger.add_authentication_result(Rc::clone(&result), Some("signer"));

    let found = ledger
        .authentication_result_for_security_token(&token, Some("signer"))
        .unwrap()
        .unwrap();
    assert!(Rc::ptr_eq(&found, &result));
    assert!(ledger
        .authentication_result_for_security_token(&token, None)
        .unwrap()
        .is_none());
    assert!(ledger
        .authentication_result_for_security_token(&other, Some("signer"))
        .unwrap()
        .is_none());

    let rival = Rc::new(
        AuthenticationResult::new(User::new("2", "mallory", "pki"))
            .with_security_token(Rc::clone(&token)),
    );
    ledger.add_authentication_result(rival, None);
    let err = ledger
        .authentication_result_for_security_token(&token, Some("signer"))
        .unwrap_err();
    assert!(matches!(err, Error::AmbiguousToken { matches: 2 }));
}

#[test]
fn credentials_are_collected_and_redacted() {
    let ctx = factory().create_root_context(Message::new(), Message::new(), true);
    let ledger = ctx.default_authentication_context();
    ledger.add_credentials(LoginCredentials::new(
        "alice",
        "hunter2",
        CredentialFormat::ClearText,
        "http-basic",
    ));

    let creds = ledger.last_credentials().unwrap();
    assert_eq!(creds.login(), "alice");
    assert_eq!(creds.secret().expose_secret().as_slice(), b"hunter2");
    assert!(!format!("{:?}", creds).contains("hunter2"));
    assert_eq!(ledger.credentials_for_source("http-basic").len(), 1);
}

#[test]
fn close_is_idempotent_and_runs_each_callback_once() {
    let factory = factory();
    let root = factory.create_root_context(Message::new(), Message::new(), true);
    let child = factory.create_child_context(&root);
    let runs = Rc::new(Cell::new(0));

    for ctx in [&root, &child] {
        let runs = Rc::clone(&runs);
        ctx.run_on_close(move || runs.set(runs.get() + 1));
    }

    child.close();
    child.close();
    assert_eq!(runs.get(), 1);
    root.close();
    root.close();
    assert_eq!(runs.get(), 2);
    assert!(root.request().borrow().is_closed());
    assert!(root.response().borrow().is_closed());
}

#[test]
fn batch_lookup_reports_misses_to_the_auditor() {
    let trail = Rc::new(AuditTrail::new());
    let ctx = factory()
        .with_auditor(trail.clone())
        .create_root_context(Message::new(), Message::new(), true);
    ctx.set_variable("Present", "yes").unwrap();

    let found = ctx.get_variables(&["present", "absent", "requestId"]);
    assert_eq!(found.len(), 2);
    assert!(found.contains_key("Present"));
    assert_eq!(trail.count(AuditEventKind::VariableNotFound), 1);
    assert_eq!(trail.events()[0].variable(), Some("absent"));
}

#[test]
fn nested_includes_number_assertions() {
    let factory = factory();
    let root = factory.create_root_context(Message::new(), Message::new(), true);
    let include = AssertionRef::new(3, "include");
    root.assertion_starting(&include);

    let child = factory.create_child_context(&root);
    let inner = AssertionRef::new(2, "check");
    child.assertion_starting(&inner);
    assert_eq!(child.assertion_number(), vec![3, 2]);
    assert_eq!(
        child.get_variable("assertion.numberStr").unwrap(),
        Value::from("3.2")
    );
    child.assertion_finished(&inner, AssertionStatus::Falsified, None);
    child.set_policy_result(AssertionStatus::Falsified);
    child.close();

    root.assertion_finished(&include, AssertionStatus::Falsified, None);
    assert!(root
        .seen_assertion_statuses()
        .contains(&AssertionStatus::Falsified));
    assert!(root.policy_result().is_none());
    assert!(root.is_policy_execution_attempted());
}

#[test]
fn current_context_is_scoped() {
    let factory = factory();
    let root = factory.create_root_context(Message::new(), Message::new(), true);
    let seen = RefCell::new(Vec::new());

    factory.with_current_context(&root, || {
        let child = factory.create_child_context(&root);
        factory.with_current_context(&child, || {
            let ctx = ContextFactory::current_context().unwrap();
            seen.borrow_mut().push(ctx.kind());
        });
        let ctx = ContextFactory::current_context().unwrap();
        seen.borrow_mut().push(ctx.kind());
    });

    assert_eq!(*seen.borrow(), vec![ContextKind::Child, ContextKind::Root]);
    assert!(ContextFactory::current_context().is_none());
}

#[test]
fn configuration_file_drives_new_contexts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("context.toml");
    std::fs::write(
        &path,
        "[audit]\ndefault_level = \"FINE\"\nsave_response = true\n\n[faults]\nlevel = \"full_trace_fault\"\n",
    )
    .unwrap();

    let config = ContextConfig::load_from(&path).unwrap();
    let ctx = ContextFactory::new(config).create_root_context(Message::new(), Message::new(), true);
    assert_eq!(ctx.get_variable("auditLevel").unwrap(), Value::from("FINE"));
    assert!(ctx.is_audit_save_response());
}

#[test]
fn output_message_variable_is_created_on_demand() {
    let ctx = factory().create_root_context(Message::new(), Message::new(), true);
    let target = MessageTarget::Variable("testMessage".into());
    assert!(ctx.get_target_message(&target).unwrap_err().is_not_found());

    let created = ctx.get_or_create_target_message(&target, false).unwrap();
    created.borrow_mut().set_body_text("<out/>").unwrap();

    let stored = match ctx.get_variable("testMessage").unwrap() {
        Value::Message(message) => message,
        other => panic!("expected a message, got {}", other.type_name()),
    };
    assert_eq!(stored.borrow().body_text().unwrap(), "<out/>");
    assert!(Rc::ptr_eq(&ctx.get_target_message(&target).unwrap(), &created));
}
