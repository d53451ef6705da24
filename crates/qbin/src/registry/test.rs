use std::sync::Arc;

use qbin_stable_type_id::Identifiable;
use tracing_test::traced_test;

use crate::{
    Decoded, Error, Packable, Packer, StreamPacker, StreamUnpacker, Template,
    TemplateRegistry, Templated, Unpacker, Value, template::DefaultTemplate,
};

// ============================================================================
// Recursive type with a hand-written template
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Identifiable)]
struct Node {
    value: i64,
    children: Vec<Node>,
}

struct NodeTemplate {
    children: Arc<dyn Template<Vec<Node>>>,
}

impl Template<Node> for NodeTemplate {
    fn write(&self, packer: &mut dyn Packer, value: &Node) -> crate::Result<()> {
        packer.write_array_begin(2)?;
        packer.write_i64(value.value)?;
        self.children.write(packer, &value.children)?;
        packer.write_array_end()
    }

    fn read(
        &self,
        unpacker: &mut dyn Unpacker,
        _reuse: Option<Node>,
    ) -> crate::Result<Decoded<Node>> {
        unpacker.read_array_begin()?;
        let value = unpacker.read_i64()?;
        let children = self.children.read(unpacker, None)?.into_inner();
        unpacker.read_array_end(true)?;

        Ok(Decoded::Fresh(Node { value, children }))
    }
}

impl Templated for Node {
    fn build_template(
        registry: &TemplateRegistry,
    ) -> crate::Result<Arc<dyn Template<Self>>> {
        Ok(Arc::new(NodeTemplate { children: registry.lookup::<Vec<Self>>()? }))
    }
}

fn tree() -> Node {
    Node {
        value: 1,
        children: vec![
            Node { value: 2, children: Vec::new() },
            Node {
                value: 3,
                children: vec![Node { value: 4, children: Vec::new() }],
            },
        ],
    }
}

// ============================================================================
// Types whose builds misbehave
// ============================================================================

/// Invokes its own placeholder while being built.
#[derive(Debug, Default, Identifiable)]
struct Eager;

impl Templated for Eager {
    fn build_template(
        registry: &TemplateRegistry,
    ) -> crate::Result<Arc<dyn Template<Self>>> {
        let placeholder = registry.lookup::<Self>()?;
        let mut packer = StreamPacker::new(Vec::new());
        placeholder.write(&mut packer, &Self)?;

        Ok(placeholder)
    }
}

/// Builds a dependency, then fails.
#[derive(Debug, Default, Identifiable)]
struct Broken;

impl Templated for Broken {
    fn build_template(
        registry: &TemplateRegistry,
    ) -> crate::Result<Arc<dyn Template<Self>>> {
        registry.lookup::<Vec<i16>>()?;
        Err(Error::invalid_data("broken on purpose"))
    }
}

// ============================================================================
// Packable type
// ============================================================================

#[derive(Debug, Default, PartialEq, Identifiable)]
struct Counter {
    hits: u32,
}

impl Packable for Counter {
    fn write_to(&self, packer: &mut dyn Packer) -> crate::Result<()> {
        packer.write_u32(self.hits)
    }

    fn read_from(&mut self, unpacker: &mut dyn Unpacker) -> crate::Result<()> {
        self.hits = unpacker.read_u32()?;
        Ok(())
    }
}

/// Writes every `u8` doubled.
struct Doubling;

impl Template<u8> for Doubling {
    fn write(&self, packer: &mut dyn Packer, value: &u8) -> crate::Result<()> {
        packer.write_u16(u16::from(*value) * 2)
    }

    fn read(
        &self,
        unpacker: &mut dyn Unpacker,
        _reuse: Option<u8>,
    ) -> crate::Result<Decoded<u8>> {
        Ok(Decoded::Fresh(unpacker.read_u8()?))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn lookup_is_cached() {
    let registry = TemplateRegistry::new();
    assert!(!registry.is_published::<Vec<u32>>());

    let first = registry.lookup::<Vec<u32>>().unwrap();
    let second = registry.lookup::<Vec<u32>>().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(registry.is_published::<Vec<u32>>());
    assert!(registry.is_published::<u32>());
}

#[test]
fn clones_share_templates() {
    let registry = TemplateRegistry::new();
    let clone = registry.clone();

    let template = registry.lookup::<String>().unwrap();
    assert!(clone.is_published::<String>());
    assert!(Arc::ptr_eq(&template, &clone.lookup::<String>().unwrap()));
}

#[test]
fn lookup_registered_ignores_templated() {
    let registry = TemplateRegistry::new();

    assert!(matches!(
        registry.lookup_registered::<u32>(),
        Err(Error::TemplateNotFound { .. })
    ));
    assert!(!registry.is_published::<u32>());
}

#[test]
fn registered_template_wins() {
    let registry = TemplateRegistry::new();
    registry.register::<u8>(Arc::new(Doubling));

    let value = registry.to_value(&vec![3u8, 4]).unwrap();
    assert_eq!(value, Value::Array(vec![Value::from(6u8), Value::from(8u8)]));
}

#[test]
fn registered_builder_takes_precedence() {
    let registry = TemplateRegistry::new();
    registry.register_builder::<u8>(|_| Ok(Arc::new(Doubling)));

    assert_eq!(registry.to_value(&21u8).unwrap(), Value::from(42u8));
}

#[test]
fn recursive_type_round_trips() {
    let registry = TemplateRegistry::new();
    let node = tree();

    let value = registry.to_value(&node).unwrap();
    assert_eq!(registry.from_value::<Node>(&value).unwrap(), node);

    let bytes = registry.encode(&node).unwrap();
    assert_eq!(registry.decode::<Node>(&bytes).unwrap(), node);

    assert!(registry.is_published::<Node>());
    assert!(registry.is_published::<Vec<Node>>());
}

#[test]
fn placeholder_resolves_after_publish() {
    let registry = TemplateRegistry::new();
    registry.lookup::<Node>().unwrap();

    // the element template of Vec<Node> is the placeholder handed out while
    // Node was being built; it now forwards to the published template
    let list = registry.lookup::<Vec<Node>>().unwrap();
    let value = registry.to_value(&tree().children).unwrap();

    let mut converter = crate::Converter::new(&value);
    let children = list.read(&mut converter, None).unwrap().into_inner();
    assert_eq!(children, tree().children);
}

#[test]
fn placeholder_invoked_during_build_fails() {
    let registry = TemplateRegistry::new();

    assert!(matches!(
        registry.lookup::<Eager>(),
        Err(Error::TemplateLookupFailed { .. })
    ));
    assert!(!registry.is_published::<Eager>());

    // the failed session left nothing behind
    assert!(matches!(
        registry.lookup::<Eager>(),
        Err(Error::TemplateLookupFailed { .. })
    ));
    assert!(registry.lookup::<Node>().is_ok());
}

#[test]
fn failed_build_publishes_nothing() {
    let registry = TemplateRegistry::new();

    assert!(matches!(registry.lookup::<Broken>(), Err(Error::InvalidData(_))));
    assert!(!registry.is_published::<Broken>());
    assert!(!registry.is_published::<Vec<i16>>());
    assert!(!registry.is_published::<i16>());
    assert_eq!(registry.published_count(), 0);

    // dependencies still build on their own
    assert!(registry.lookup::<Vec<i16>>().is_ok());
    assert!(registry.is_published::<i16>());
}

#[test]
fn packable_round_trip() {
    let registry = TemplateRegistry::new();
    registry.register_packable::<Counter>();

    let template = registry.lookup_registered::<Counter>().unwrap();

    let mut packer = StreamPacker::new(Vec::new());
    template.write(&mut packer, &Counter { hits: 300 }).unwrap();
    let bytes = packer.finish().unwrap();

    let mut unpacker = StreamUnpacker::new(bytes.as_slice());
    let fresh = template.read(&mut unpacker, None).unwrap();
    assert_eq!(fresh, Decoded::Fresh(Counter { hits: 300 }));

    let mut unpacker = StreamUnpacker::new(bytes.as_slice());
    let reused =
        template.read(&mut unpacker, Some(Counter { hits: 1 })).unwrap();
    assert_eq!(reused, Decoded::Reused(Counter { hits: 300 }));
}

#[test]
fn default_template_forwards_to_published() {
    let registry = TemplateRegistry::new();
    let forwarding = DefaultTemplate::<u16>::new(&registry);
    assert!(!forwarding.is_packable());

    let mut packer = crate::ValueBuilder::new();
    assert!(matches!(
        forwarding.write(&mut packer, &7),
        Err(Error::TemplateLookupFailed { .. })
    ));

    registry.lookup::<u16>().unwrap();
    forwarding.write(&mut packer, &7).unwrap();
    assert_eq!(packer.finish().unwrap(), Value::from(7u8));
}

#[test]
fn default_template_outliving_registry_fails() {
    let registry = TemplateRegistry::new();
    registry.lookup::<u16>().unwrap();

    let forwarding = DefaultTemplate::<u16>::new(&registry);
    drop(registry);

    let mut packer = crate::ValueBuilder::new();
    assert!(matches!(
        forwarding.write(&mut packer, &7),
        Err(Error::TemplateLookupFailed { .. })
    ));
}

#[test]
fn decode_rejects_trailing_bytes() {
    let registry = TemplateRegistry::new();
    let mut bytes = registry.encode(&5u32).unwrap();
    bytes.push(0xc0);

    assert!(matches!(
        registry.decode::<u32>(&bytes),
        Err(Error::InvalidData(_))
    ));
}

#[test]
fn unpack_into_reuses_target() {
    let registry = TemplateRegistry::new();
    let value = registry.to_value(&vec![1u64, 2, 3]).unwrap();

    let decoded = registry
        .unpack_into(&mut crate::Converter::new(&value), vec![9u64, 9, 9])
        .unwrap();

    assert!(decoded.is_reused());
    assert_eq!(decoded.into_inner(), vec![1, 2, 3]);
}

#[test]
fn concurrent_lookups_agree() {
    let registry = TemplateRegistry::new();

    let templates: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| registry.lookup::<Vec<Node>>().unwrap()))
            .collect();

        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    for template in &templates[1..] {
        assert!(Arc::ptr_eq(&templates[0], template));
    }
}

#[test]
#[traced_test]
fn build_is_logged() {
    let registry = TemplateRegistry::new();
    registry.lookup::<Node>().unwrap();

    assert!(logs_contain("building template"));
    assert!(logs_contain("published build session"));
}
