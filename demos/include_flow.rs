//! Policy inclusion walkthrough.
//!
//! This example drives a root context and a child context the way an assertion
//! execution engine would:
//! 1. Authenticate the request in the root policy
//! 2. Include a sub-policy that routes the request
//! 3. Export one variable from the sub-policy back to the caller
//! 4. Close the child, then the root
//!
//! Run with: `cargo run --example include_flow`

use std::rc::Rc;
use std::time::Duration;

use policy_context::{
    AssertionMetrics, AssertionRef, AssertionStatus, AuthenticationResult, ContextFactory, Message,
    RoutingStatus, User,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("policy_context=debug,policy_audit=info")),
        )
        .init();

    println!("=== Include Flow Example ===\n");

    let factory = ContextFactory::default();
    let root = factory.create_root_context(Message::new(), Message::new(), true);

    // Step 1: the root policy authenticates the caller
    println!("--- Step 1: Authenticate ---");
    let authenticate = AssertionRef::new(1, "authenticate");
    root.assertion_starting(&authenticate);
    let alice = Rc::new(AuthenticationResult::new(User::new("u-1", "alice", "ldap")));
    root.add_authentication_result(alice, Some("ldap"));
    root.assertion_finished(
        &authenticate,
        AssertionStatus::None,
        Some(AssertionMetrics::new(Duration::from_millis(3))),
    );
    println!("✓ Authenticated user: {:?}", root.get_variable("request.authenticatedUser"));

    // Step 2: include a sub-policy
    println!("\n--- Step 2: Include ---");
    let include = AssertionRef::new(2, "include routing fragment");
    root.assertion_starting(&include);
    let child = factory.create_child_context(&root);
    child.pass_variable_to_parent("route", true);

    let route = AssertionRef::new(1, "route");
    child.assertion_starting(&route);
    child.log().info(format_args!("routing from included policy"));
    child.set_routed_service_url("http://backend.internal/orders");
    child.routing_started();
    child.set_routing_status(RoutingStatus::Attempted);
    child.routing_finished();
    child.set_routing_status(RoutingStatus::Routed);
    child.set_variable("route.backend", "orders").ok();
    child.set_variable("scratch", "child only").ok();
    child.assertion_finished(&route, AssertionStatus::None, None);
    println!("✓ Child assertion number: {:?}", child.assertion_number());

    // Step 3: the caller sees shared state and exported variables only
    println!("\n--- Step 3: Back in the root ---");
    child.close();
    root.assertion_finished(&include, AssertionStatus::None, None);
    println!("✓ Routing status: {}", root.routing_status());
    println!("✓ Routed URL: {:?}", root.routed_service_url());
    println!("✓ route.backend: {:?}", root.get_variable("route.backend"));
    println!("✓ scratch visible: {}", root.get_variable("scratch").is_ok());

    // Step 4: finish the request
    println!("\n--- Step 4: Close ---");
    root.set_end_time();
    root.run_on_close(|| println!("✓ Root cleanup ran"));
    root.close();
    println!("✓ Request message closed: {}", root.request().borrow().is_closed());
}
