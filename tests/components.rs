use sapling_dom::{
	clone_element, forward_ref, fragment, memo,
	memory::{MemoryHandle, MemoryTarget},
	Child, Component, ComponentHandle, ComponentType, Context, Element, Handler, Key, Props, Ref, RefValue, RenderContext, RenderError, Renderer, RendererOptions, Value,
};
use std::{
	any::Any,
	cell::{Cell, RefCell},
	rc::Rc,
};

type Log = Rc<RefCell<Vec<String>>>;

fn counter() -> Rc<Cell<usize>> {
	Rc::new(Cell::new(0))
}

fn text_prop(props: &Props, name: &str) -> String {
	props.get(name).and_then(Value::as_str).unwrap_or_default().to_owned()
}

#[test]
fn context_changes_reach_readers_behind_skipping_components() {
	let theme = Context::new("light");
	let label_renders = counter();
	let label = ComponentType::function("Label", {
		let (theme, renders) = (theme.clone(), label_renders.clone());
		move |cx| {
			renders.set(renders.get() + 1);
			Ok(cx.context(&theme).as_str().unwrap_or_default().to_owned().into())
		}
	});
	let wall = memo(&ComponentType::function("Wall", move |_| Ok(label.element().build())), None);

	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	renderer.render_tree(theme.provide("dark", vec![wall.element().build()]), &root).unwrap();
	assert_eq!(renderer.target().to_html(&root), "dark");

	renderer.render_tree(theme.provide("blue", vec![wall.element().build()]), &root).unwrap();
	assert_eq!(renderer.target().to_html(&root), "dark");
	assert_eq!(renderer.scheduler().len(), 1);

	renderer.flush().unwrap();
	assert_eq!(renderer.target().to_html(&root), "blue");
	assert_eq!(label_renders.get(), 2);
}

#[test]
fn readers_outside_providers_see_the_default() {
	let theme = Context::new("light");
	let label = ComponentType::function("Label", move |cx| Ok(cx.context(&theme).as_str().unwrap_or_default().to_owned().into()));

	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	renderer.render_tree(label.element().build(), &root).unwrap();
	assert_eq!(renderer.target().to_html(&root), "light");
}

#[test]
fn memo_skips_equal_props() {
	let renders = counter();
	let inner = ComponentType::function("Inner", {
		let renders = renders.clone();
		move |cx| {
			renders.set(renders.get() + 1);
			Ok(text_prop(cx.props(), "label").into())
		}
	});
	let memoized = memo(&inner, None);
	let by_id = memo(&inner, Some(Rc::new(|a: &Props, b: &Props| a.get("id") == b.get("id"))));

	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	let view = |label: &str, id: i64| {
		fragment(vec![
			memoized.element().prop("label", label.to_owned()).build(),
			by_id.element().prop("label", label.to_owned()).prop("id", id).build(),
		])
	};

	renderer.render_tree(view("a", 1), &root).unwrap();
	assert_eq!(renders.get(), 2);
	renderer.render_tree(view("a", 1), &root).unwrap();
	assert_eq!(renders.get(), 2);

	renderer.render_tree(view("b", 1), &root).unwrap();
	assert_eq!(renders.get(), 3);
	assert_eq!(renderer.target().to_html(&root), "ba");

	renderer.render_tree(view("b", 2), &root).unwrap();
	assert_eq!(renderer.target().to_html(&root), "bb");
}

#[test]
fn forwarded_refs_reach_inner_elements() {
	let input = forward_ref("Input", |cx| {
		let mut element = Element::tag("input").prop("type", "text");
		if let Some(node_ref) = cx.forwarded_ref() {
			element = element.node_ref(node_ref.clone());
		}
		Ok(element.build())
	});
	let node_ref = Ref::object();

	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	renderer.render_tree(input.element().node_ref(node_ref.clone()).build(), &root).unwrap();

	let handle: MemoryHandle = node_ref.current().and_then(|value| value.target()).unwrap();
	assert_eq!(renderer.target().property(&handle, "type").and_then(Value::as_str), Some("text"));

	renderer.unmount_tree(&root);
	assert!(node_ref.current().is_none());
}

#[test]
fn callback_refs_follow_their_node() {
	let log = Log::default();
	let node_ref = Ref::callback({
		let log = log.clone();
		move |value: Option<RefValue>| log.borrow_mut().push(if value.is_some() { "attached" } else { "detached" }.to_owned())
	});
	let view = |node_ref: Option<&Ref>| {
		let mut element = Element::tag("p");
		if let Some(node_ref) = node_ref {
			element = element.node_ref(node_ref.clone());
		}
		element.build()
	};

	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	renderer.render_tree(view(Some(&node_ref)), &root).unwrap();
	renderer.render_tree(view(Some(&node_ref)), &root).unwrap();
	assert_eq!(*log.borrow(), ["attached"]);

	renderer.render_tree(view(None), &root).unwrap();
	assert_eq!(*log.borrow(), ["attached", "detached"]);

	renderer.render_tree(view(Some(&node_ref)), &root).unwrap();
	renderer.unmount_tree(&root);
	assert_eq!(*log.borrow(), ["attached", "detached", "attached", "detached"]);
}

#[test]
fn component_refs_hold_handles() {
	let node_ref = Ref::object();
	let ty = ComponentType::function("Thing", |_| Ok("thing".into()));

	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	renderer.render_tree(ty.element().node_ref(node_ref.clone()).build(), &root).unwrap();

	let handle = node_ref.current().and_then(|value| value.component().cloned()).unwrap();
	assert!(handle.is_mounted());
	assert!(node_ref.current().and_then(|value| value.target::<MemoryHandle>()).is_none());
}

struct Tracked {
	name: String,
	log: Log,
}
impl Component for Tracked {
	fn render(&mut self, cx: &RenderContext<'_>) -> Result<Child, RenderError> {
		Ok(cx.children().to_vec().into())
	}

	fn did_mount(&mut self, _handle: &ComponentHandle) -> Result<(), RenderError> {
		self.log.borrow_mut().push(format!("{} mounted", self.name));
		Ok(())
	}

	fn will_unmount(&mut self) {
		self.log.borrow_mut().push(format!("{} unmounting", self.name));
	}
}

#[test]
fn lifecycle_order() {
	let log = Log::default();
	let tracked = ComponentType::new("Tracked", {
		let log = log.clone();
		move |props: &Props| Tracked {
			name: text_prop(props, "name"),
			log: log.clone(),
		}
	});

	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	renderer
		.render_tree(
			tracked
				.element()
				.prop("name", "parent")
				.child(tracked.element().prop("name", "first").build())
				.child(tracked.element().prop("name", "second").build())
				.build(),
			&root,
		)
		.unwrap();
	renderer.unmount_tree(&root);

	assert_eq!(
		*log.borrow(),
		[
			"first mounted",
			"second mounted",
			"parent mounted",
			"parent unmounting",
			"first unmounting",
			"second unmounting"
		]
	);
}

#[test]
fn hooks_observe_the_pass() {
	let log = Log::default();
	let greeting = ComponentType::function("Greeting", |_| Ok(Element::tag("b").child("hi").build()));
	let broken = ComponentType::function("Broken", |_| Err(RenderError::msg("nope")));

	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	{
		let hooks = renderer.hooks_mut();
		let push = |log: &Log, entry: String| log.borrow_mut().push(entry);
		hooks
			.chain_root({
				let log = log.clone();
				move |child: &Child| push(&log, format!("root {}", matches!(child, Child::Empty)))
			})
			.chain_render({
				let log = log.clone();
				move |node| push(&log, format!("render {}", node.name))
			})
			.chain_unmount({
				let log = log.clone();
				move |node| push(&log, format!("unmount {}", node.name))
			})
			.chain_catch_error({
				let log = log.clone();
				move |error, node| push(&log, format!("error {} at {}", error, node.name))
			});
	}
	let commits = counter();
	renderer.hooks_mut().chain_commit({
		let commits = commits.clone();
		move |_| commits.set(commits.get() + 1)
	});

	renderer.render_tree(greeting.element().build(), &root).unwrap();
	assert_eq!(commits.get(), 1);
	assert_eq!(*log.borrow(), ["root false", "render Fragment", "render Greeting"]);
	log.borrow_mut().clear();

	renderer.unmount_tree(&root);
	assert_eq!(*log.borrow(), ["root true", "unmount Fragment", "unmount Greeting", "unmount b", "unmount #text"]);
	log.borrow_mut().clear();

	assert!(renderer.render_tree(broken.element().build(), &root).is_err());
	assert!(log.borrow().contains(&"error nope at Broken".to_owned()));
}

#[test]
fn render_component_renders_synchronously() {
	let renders = counter();
	let slot: Rc<RefCell<Option<ComponentHandle>>> = Rc::default();
	let ty = ComponentType::function("Clock", {
		let (renders, slot) = (renders.clone(), slot.clone());
		move |cx| {
			renders.set(renders.get() + 1);
			*slot.borrow_mut() = Some(cx.handle());
			Ok((renders.get() as i64).into())
		}
	});

	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	renderer.render_tree(Element::tag("span").child(ty.element().build()).build(), &root).unwrap();

	let handle = slot.borrow().clone().unwrap();
	renderer.render_component(&handle).unwrap();
	assert_eq!(renderer.target().to_html(&root), "<span>2</span>");

	renderer.unmount_tree(&root);
	renderer.render_component(&handle).unwrap();
	assert_eq!(renders.get(), 2);
}

#[test]
fn cloned_elements_merge_props() {
	let original = match Element::tag("a").prop("href", "/").prop("class", "plain").child("home").build() {
		Child::Element(element) => element,
		_ => unreachable!(),
	};
	let cloned = clone_element(&original, Props::new().with("class", "fancy"), Some("nav".into()), None, None);

	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	renderer.render_tree(cloned.clone(), &root).unwrap();
	assert_eq!(renderer.target().to_html(&root), r#"<a class="fancy" href="/">home</a>"#);

	if let Child::Element(cloned) = &cloned {
		assert_eq!(cloned.key(), Some(&Key::from("nav")));
		assert_eq!(original.props().get("class").and_then(Value::as_str), Some("plain"));
	}
}

#[test]
fn handlers_are_bound_as_properties() {
	let clicks = counter();
	let handler: Handler = Rc::new({
		let clicks = clicks.clone();
		move |payload: &dyn Any| clicks.set(clicks.get() + payload.downcast_ref::<usize>().copied().unwrap_or(1))
	});
	let node_ref = Ref::object();

	let mut renderer = Renderer::new(MemoryTarget::new());
	let root = renderer.target_mut().create_root();
	renderer
		.render_tree(Element::tag("button").node_ref(node_ref.clone()).prop("onClick", handler).child("+").build(), &root)
		.unwrap();
	assert_eq!(renderer.target().to_html(&root), "<button>+</button>");

	let button: MemoryHandle = node_ref.current().and_then(|value| value.target()).unwrap();
	assert!(renderer.target().dispatch(&button, "Click", &2_usize));
	assert!(!renderer.target().dispatch(&button, "Hover", &()));
	assert_eq!(clicks.get(), 2);

	renderer.render_tree(Element::tag("button").node_ref(node_ref).child("+").build(), &root).unwrap();
	assert!(!renderer.target().dispatch(&button, "Click", &()));
}

#[test]
fn deep_trees_stop_at_the_depth_limit() {
	let nested = (0..5).fold(Child::from("leaf"), |child, _| Element::tag("div").child(child).build());

	let mut renderer = Renderer::with_options(
		MemoryTarget::new(),
		RendererOptions {
			max_depth: 3,
			..RendererOptions::default()
		},
	);
	let root = renderer.target_mut().create_root();
	renderer.render_tree(nested, &root).unwrap();
	assert_eq!(renderer.target().to_html(&root), "<div><div><div></div></div></div>");
}
