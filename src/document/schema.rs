use serde_json::{json, Map, Value};

use crate::source::{TypeIndex, TypeShape};

/// Nesting depth past which indexed structs are described as bare objects
const MAX_DEPTH: usize = 4;

/// JSON schema for a Rust type as written in a signature
///
/// Primitives, strings, `Option`, sequences and maps are mapped directly.
/// Indexed structs expand into their fields and fieldless indexed enums into
/// a string enumeration; anything else is an unconstrained object.
pub fn rust_type_schema(ty: &str, types: &TypeIndex) -> Value {
    schema_at(ty, types, 0)
}

fn schema_at(ty: &str, types: &TypeIndex, depth: usize) -> Value {
    let ty = strip_reference(ty.trim());
    match ty {
        "String" | "str" | "char" => return json!({ "type": "string" }),
        "bool" => return json!({ "type": "boolean" }),
        "i8" | "i16" | "i32" | "u8" | "u16" | "u32" => {
            return json!({ "type": "integer", "format": "int32" })
        }
        "i64" | "u64" | "i128" | "u128" | "isize" | "usize" => {
            return json!({ "type": "integer", "format": "int64" })
        }
        "f32" => return json!({ "type": "number", "format": "float" }),
        "f64" => return json!({ "type": "number", "format": "double" }),
        "Vec<u8>" | "[u8]" => return json!({ "type": "string", "format": "byte" }),
        "()" => return json!({}),
        _ => {}
    }

    if let Some(inner) = slice_inner(ty) {
        return json!({ "type": "array", "items": schema_at(inner, types, depth) });
    }
    if let Some((name, args)) = split_generic(ty) {
        return match (last_segment(name), args.as_slice()) {
            ("Option", [inner]) => nullable(schema_at(inner, types, depth)),
            ("Box" | "Arc" | "Rc" | "Cow", [.., inner]) => schema_at(inner, types, depth),
            ("Vec" | "VecDeque" | "HashSet" | "BTreeSet", [inner]) => {
                json!({ "type": "array", "items": schema_at(inner, types, depth) })
            }
            ("HashMap" | "BTreeMap", [_, value]) => json!({
                "type": "object",
                "additionalProperties": schema_at(value, types, depth),
            }),
            _ => json!({ "type": "object" }),
        };
    }

    match types.get(last_segment(ty)).map(|t| &t.shape) {
        Some(TypeShape::Struct(fields)) if depth < MAX_DEPTH => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for field in fields {
                properties.insert(field.name.clone(), schema_at(&field.ty, types, depth + 1));
                if !field.ty.starts_with("Option<") {
                    required.push(Value::String(field.name.clone()));
                }
            }
            let mut schema = json!({ "type": "object", "properties": properties });
            if !required.is_empty() {
                schema["required"] = Value::Array(required);
            }
            schema
        }
        Some(TypeShape::Enum(variants)) if !variants.is_empty() && variants.iter().all(|v| v.unit) => {
            let names: Vec<Value> = variants.iter().map(|v| Value::String(v.name.clone())).collect();
            json!({ "type": "string", "enum": names })
        }
        _ => json!({ "type": "object" }),
    }
}

/// Widen `schema` to also accept `null`
///
/// A single `type` becomes `[type, "null"]`; the empty schema already accepts
/// `null`.
fn nullable(mut schema: Value) -> Value {
    if let Some(obj) = schema.as_object_mut() {
        if let Some(Value::String(t)) = obj.get("type").cloned() {
            obj.insert("type".to_string(), json!([t, "null"]));
        }
    }
    schema
}

/// `&'a mut T` -> `T`
fn strip_reference(ty: &str) -> &str {
    let Some(rest) = ty.strip_prefix('&') else {
        return ty;
    };
    let rest = match rest.strip_prefix('\'') {
        Some(lifetimed) => lifetimed.split_once(' ').map(|(_, t)| t).unwrap_or(lifetimed),
        None => rest,
    };
    rest.strip_prefix("mut ").unwrap_or(rest).trim()
}

/// `[T]` or `[T; N]` -> `T`
fn slice_inner(ty: &str) -> Option<&str> {
    let inner = ty.strip_prefix('[')?.strip_suffix(']')?;
    Some(inner.split_once(';').map(|(t, _)| t).unwrap_or(inner).trim())
}

/// `a::Name<A, B<C, D>>` -> (`a::Name`, [`A`, `B<C, D>`])
fn split_generic(ty: &str) -> Option<(&str, Vec<&str>)> {
    let open = ty.find('<')?;
    let body = ty[open + 1..].strip_suffix('>')?;
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = body[start..].trim();
    if !last.is_empty() {
        args.push(last);
    }
    // lifetimes (`Cow<'a, str>`) carry no schema
    args.retain(|a| !a.starts_with('\''));
    Some((&ty[..open], args))
}

fn last_segment(ty: &str) -> &str {
    ty.rsplit("::").next().unwrap_or(ty)
}
