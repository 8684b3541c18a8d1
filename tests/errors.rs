use sapling_dom::{memory::MemoryTarget, Child, Component, ComponentHandle, ComponentType, Element, Props, RenderContext, RenderError, Renderer, State, Value};

/// Shows `recovered: …` once a descendant failed. With a `fallback`, renders that instead.
struct Boundary {
	fallback: Option<ComponentType>,
}
impl Component for Boundary {
	fn render(&mut self, cx: &RenderContext<'_>) -> Result<Child, RenderError> {
		match (cx.state().get("error").and_then(Value::as_str), &self.fallback) {
			(Some(_), Some(fallback)) => Ok(fallback.element().build()),
			(Some(error), None) => Ok(format!("recovered: {}", error).into()),
			(None, _) => Ok(cx.children().to_vec().into()),
		}
	}

	fn derive_state_from_error(&self, error: &RenderError) -> Option<State> {
		Some(Props::new().with("error", error.to_string()))
	}
}

fn boundary() -> ComponentType {
	ComponentType::new("Boundary", |_| Boundary { fallback: None })
}

fn bomb() -> ComponentType {
	ComponentType::function("Bomb", |_| Err(RenderError::msg("boom")))
}

#[test]
fn boundaries_recover_on_the_next_flush() {
	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	renderer
		.render_tree(boundary().element().child("before").child(bomb().element().build()).build(), &root)
		.unwrap();
	assert_eq!(renderer.target().to_html(&root), "before");
	assert_eq!(renderer.scheduler().len(), 1);

	renderer.flush().unwrap();
	assert_eq!(renderer.target().to_html(&root), "recovered: boom");
}

#[test]
fn unhandled_failures_roll_back_fresh_trees() {
	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	let error = renderer
		.render_tree(Element::tag("div").child("text").child(bomb().element().build()).build(), &root)
		.unwrap_err();
	assert_eq!(error.to_string(), "boom");
	assert_eq!(renderer.target().to_html(&root), "");
	assert_eq!(renderer.mounted_nodes(), 0);

	renderer.render_tree(Element::tag("div").child("fine").build(), &root).unwrap();
	assert_eq!(renderer.target().to_html(&root), "<div>fine</div>");
}

#[test]
fn unhandled_failures_during_updates_keep_the_tree_usable() {
	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	renderer.render_tree(Element::tag("div").child("ok").build(), &root).unwrap();

	let result = renderer.render_tree(Element::tag("div").child("changed").child(bomb().element().build()).build(), &root);
	assert!(result.is_err());
	// Mutations applied before the failure stay in the target.
	assert_eq!(renderer.target().to_html(&root), "<div>changed</div>");

	renderer.render_tree(Element::tag("div").child("fine").build(), &root).unwrap();
	assert_eq!(renderer.target().to_html(&root), "<div>fine</div>");
}

struct FailingHandler;
impl Component for FailingHandler {
	fn render(&mut self, cx: &RenderContext<'_>) -> Result<Child, RenderError> {
		Ok(cx.children().to_vec().into())
	}

	fn did_catch(&mut self, error: &RenderError, _handle: &ComponentHandle) -> Result<(), RenderError> {
		Err(RenderError::msg(format!("handler failed on {}", error)))
	}
}

#[test]
fn failing_handlers_pass_their_own_error_on() {
	let failing = ComponentType::new("FailingHandler", |_| FailingHandler);
	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	renderer
		.render_tree(boundary().element().child(failing.element().child(bomb().element().build()).build()).build(), &root)
		.unwrap();

	renderer.flush().unwrap();
	assert_eq!(renderer.target().to_html(&root), "recovered: handler failed on boom");
}

#[test]
fn failures_while_recovering_skip_the_recovering_boundary() {
	let fragile = ComponentType::new("Fragile", |_| Boundary { fallback: Some(bomb()) });
	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	renderer
		.render_tree(boundary().element().child(fragile.element().child(bomb().element().build()).build()).build(), &root)
		.unwrap();
	assert_eq!(renderer.scheduler().len(), 1);

	renderer.flush().unwrap();
	assert_eq!(renderer.target().to_html(&root), "recovered: boom");
	assert!(renderer.scheduler().is_empty());
}

struct FailsToMount;
impl Component for FailsToMount {
	fn render(&mut self, _cx: &RenderContext<'_>) -> Result<Child, RenderError> {
		Ok("mounted".into())
	}

	fn did_mount(&mut self, _handle: &ComponentHandle) -> Result<(), RenderError> {
		Err(RenderError::msg("did_mount failed"))
	}
}

#[test]
fn lifecycle_failures_reach_boundaries() {
	let fails = ComponentType::new("FailsToMount", |_| FailsToMount);
	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	renderer.render_tree(boundary().element().child(fails.element().build()).build(), &root).unwrap();
	assert_eq!(renderer.target().to_html(&root), "mounted");

	renderer.flush().unwrap();
	assert_eq!(renderer.target().to_html(&root), "recovered: did_mount failed");
}

#[test]
fn errors_can_wrap_foreign_failures() {
	let parse = ComponentType::function("Parse", |cx| {
		let text = cx.props().get("text").and_then(Value::as_str).unwrap_or_default();
		let number: i64 = text.parse().map_err(RenderError::new)?;
		Ok(number.into())
	});
	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	renderer.render_tree(boundary().element().child(parse.element().prop("text", "12").build()).build(), &root).unwrap();
	assert_eq!(renderer.target().to_html(&root), "12");

	renderer.render_tree(boundary().element().child(parse.element().prop("text", "twelve").build()).build(), &root).unwrap();
	renderer.flush().unwrap();
	assert_eq!(renderer.target().to_html(&root), "recovered: invalid digit found in string");
}
