//! Message-backed variable demonstration.
//!
//! This example shows how an assertion can treat a string variable as a
//! message, edit the message, and see the edit land back in the variable.
//!
//! Run with: `cargo run --example message_variable`

use std::rc::Rc;

use policy_context::audit::AuditTrail;
use policy_context::{ContextFactory, Message, MessageTarget, Value};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("policy_context=debug,policy_audit=info")),
        )
        .init();

    println!("=== Message Variable Example ===\n");

    let trail = Rc::new(AuditTrail::new());
    let ctx = ContextFactory::default()
        .with_auditor(trail.clone())
        .create_root_context(Message::new(), Message::new(), true);

    ctx.set_variable("order", Value::from(vec!["<order id=\"7\"/>"]))
        .expect("order is not a built-in");
    let target = MessageTarget::Variable("order".into());

    match ctx.get_target_message(&target) {
        Ok(_) => println!("✗ unexpected message"),
        Err(err) => println!("✓ Without coercion: {}", err),
    }

    let message = ctx
        .get_or_create_target_message(&target, true)
        .expect("singleton list coerces");
    println!("✓ Body: {}", message.borrow().body_text().unwrap_or_default());

    message
        .borrow_mut()
        .set_body_text("<order id=\"7\" status=\"signed\"/>")
        .expect("message is open");
    println!("✓ Variable after edit: {:?}", ctx.get_variable("order"));

    let found = ctx.get_variables(&["order", "customer"]);
    println!("✓ Batch lookup found {} of 2", found.len());
    for event in trail.events() {
        println!("  audit: {}", event);
    }

    ctx.close();
    println!("✓ Message closed with context: {}", message.borrow().is_closed());
}
