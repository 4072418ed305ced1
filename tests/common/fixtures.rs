//! Fixture classes for integration tests.
//!
//! The classes are written by hand in the bytecode model, the way a
//! compiler for the contract language would emit them.

use storage_instrumenter::archive::{class_entry_name, Archive, ArchiveEntry};
use storage_instrumenter::bytecode::{
    AccessFlags, Annotation, ArithOp, ClassDescriptor, Constant, FieldDescriptor, FieldType,
    Instruction, InvokeKind, MethodDescriptor, MethodSignature, ValueKind, CONSTRUCTOR_NAME,
};
use storage_instrumenter::instrument::{instrument_archive, InstrumentationConfig};

pub const STORAGE: &str = "runtime.Storage";
pub const CONTRACT: &str = "runtime.Contract";
pub const STRING: &str = "lang.String";

pub fn string() -> FieldType {
    FieldType::reference(STRING)
}

pub fn method(
    name: &str,
    params: Vec<FieldType>,
    ret: Option<FieldType>,
    code: Vec<Instruction>,
) -> MethodDescriptor {
    MethodDescriptor::new(
        name,
        MethodSignature::new(params, ret),
        AccessFlags::PUBLIC,
        Some(code.into()),
    )
}

fn super_init(superclass: &str) -> Instruction {
    Instruction::invoke(
        InvokeKind::Special,
        superclass,
        CONSTRUCTOR_NAME,
        MethodSignature::void(),
    )
}

/// `Counter extends Storage { int n; String label; }`
pub fn counter() -> ClassDescriptor {
    let mut class = ClassDescriptor::new("Counter", Some(STORAGE.to_string()));
    class.fields = vec![
        FieldDescriptor::new("n", FieldType::INT, AccessFlags::PRIVATE),
        FieldDescriptor::new("label", string(), AccessFlags::PRIVATE),
    ];
    class.methods = vec![
        // Counter(int n) { super(); this.n = n; this.label = "fresh"; }
        method(
            CONSTRUCTOR_NAME,
            vec![FieldType::INT],
            None,
            vec![
                Instruction::load_this(),
                super_init(STORAGE),
                Instruction::load_this(),
                Instruction::load(ValueKind::Int, 1),
                Instruction::put_field("Counter", "n", &FieldType::INT),
                Instruction::load_this(),
                Instruction::string("fresh"),
                Instruction::put_field("Counter", "label", &string()),
                Instruction::ret(None),
            ],
        ),
        // void increment() { n = n + 1; }
        method(
            "increment",
            vec![],
            None,
            vec![
                Instruction::load_this(),
                Instruction::load_this(),
                Instruction::get_field("Counter", "n", &FieldType::INT),
                Instruction::constant(Constant::Int(1)),
                Instruction::Arithmetic {
                    op: ArithOp::Add,
                    kind: ValueKind::Int,
                },
                Instruction::put_field("Counter", "n", &FieldType::INT),
                Instruction::ret(None),
            ],
        ),
        method(
            "getLabel",
            vec![],
            Some(string()),
            vec![
                Instruction::load_this(),
                Instruction::get_field("Counter", "label", &string()),
                Instruction::ret(Some(ValueKind::Reference)),
            ],
        ),
        method(
            "setLabel",
            vec![string()],
            None,
            vec![
                Instruction::load_this(),
                Instruction::load(ValueKind::Reference, 1),
                Instruction::put_field("Counter", "label", &string()),
                Instruction::ret(None),
            ],
        ),
    ];
    class
}

/// `Shop extends Contract` with an entry constructor and a payable entry `buy(int)`
pub fn shop() -> ClassDescriptor {
    let mut class = ClassDescriptor::new("Shop", Some(CONTRACT.to_string()));
    class.fields = vec![FieldDescriptor::new("sold", FieldType::INT, AccessFlags::PRIVATE)];
    class.methods = vec![
        method(
            CONSTRUCTOR_NAME,
            vec![FieldType::INT],
            None,
            vec![
                Instruction::load_this(),
                super_init(CONTRACT),
                Instruction::load_this(),
                Instruction::load(ValueKind::Int, 1),
                Instruction::put_field("Shop", "sold", &FieldType::INT),
                Instruction::ret(None),
            ],
        )
        .with_annotation(Annotation::new("runtime.Entry")),
        method(
            "buy",
            vec![FieldType::INT],
            None,
            vec![
                Instruction::load_this(),
                Instruction::load_this(),
                Instruction::get_field("Shop", "sold", &FieldType::INT),
                Instruction::load(ValueKind::Int, 1),
                Instruction::Arithmetic {
                    op: ArithOp::Add,
                    kind: ValueKind::Int,
                },
                Instruction::put_field("Shop", "sold", &FieldType::INT),
                Instruction::ret(None),
            ],
        )
        .with_annotation(Annotation::new("runtime.Entry"))
        .with_annotation(Annotation::new("runtime.Payable")),
    ];
    class
}

/// `Customer extends Contract`, calling into `Shop`
pub fn customer() -> ClassDescriptor {
    let mut class = ClassDescriptor::new("Customer", Some(CONTRACT.to_string()));
    let shop = FieldType::reference("Shop");
    class.methods = vec![
        // void purchase(Shop shop) { shop.buy(3); }
        method(
            "purchase",
            vec![shop.clone()],
            None,
            vec![
                Instruction::load(ValueKind::Reference, 1),
                Instruction::constant(Constant::Int(3)),
                Instruction::invoke(
                    InvokeKind::Virtual,
                    "Shop",
                    "buy",
                    MethodSignature::new(vec![FieldType::INT], None),
                ),
                Instruction::ret(None),
            ],
        ),
        // Shop open() { return new Shop(5); }
        method(
            "open",
            vec![],
            Some(shop),
            vec![
                Instruction::New {
                    class: "Shop".to_string(),
                },
                Instruction::Dup,
                Instruction::constant(Constant::Int(5)),
                Instruction::invoke(
                    InvokeKind::Special,
                    "Shop",
                    CONSTRUCTOR_NAME,
                    MethodSignature::new(vec![FieldType::INT], None),
                ),
                Instruction::ret(Some(ValueKind::Reference)),
            ],
        ),
    ];
    class
}

pub fn archive_of(classes: &[ClassDescriptor]) -> Archive {
    let mut archive = Archive::new();
    for class in classes {
        archive
            .push(ArchiveEntry::new(
                class_entry_name(&class.name),
                class.to_bytes().expect("fixture classes serialize"),
            ))
            .expect("fixture class names are unique");
    }
    archive
}

/// Instrument `classes` as one archive and parse the output classes back
pub fn instrument_all(classes: &[ClassDescriptor]) -> Vec<ClassDescriptor> {
    let output = instrument_archive(&archive_of(classes), &[], &InstrumentationConfig::default())
        .expect("fixtures instrument cleanly");
    output
        .class_entries()
        .map(|entry| ClassDescriptor::from_bytes(&entry.data).expect("output classes parse"))
        .collect()
}
