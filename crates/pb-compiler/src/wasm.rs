// wasm.rs — WebAssembly module emitter.
//
// The wasm target produces a well-formed WebAssembly binary that carries
// the compiled plan. The module has no code sections: the ABI version
// and the plan travel as custom sections, which any wasm toolchain
// accepts and preserves.

use pb_capabilities::WasmAbiVersion;

const MAGIC: &[u8; 4] = b"\0asm";
const VERSION: &[u8; 4] = &[0x01, 0x00, 0x00, 0x00];
const CUSTOM_SECTION: u8 = 0;

pub const ABI_SECTION: &str = "pbuild.abi";
pub const PLAN_SECTION: &str = "pbuild.plan";

/// Emit a module carrying `plan_json` for the given ABI version.
pub fn emit_module(abi: WasmAbiVersion, plan_json: &[u8]) -> Vec<u8> {
    let abi_payload = format!(
        "{{\"version\":{},\"minor_version\":{}}}",
        abi.version, abi.minor_version
    );

    let mut out = Vec::with_capacity(plan_json.len() + 64);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(VERSION);
    write_custom_section(&mut out, ABI_SECTION, abi_payload.as_bytes());
    write_custom_section(&mut out, PLAN_SECTION, plan_json);
    out
}

fn write_custom_section(out: &mut Vec<u8>, name: &str, payload: &[u8]) {
    let mut body = Vec::with_capacity(name.len() + payload.len() + 5);
    write_leb128(&mut body, name.len() as u64);
    body.extend_from_slice(name.as_bytes());
    body.extend_from_slice(payload);

    out.push(CUSTOM_SECTION);
    write_leb128(out, body.len() as u64);
    out.extend_from_slice(&body);
}

fn write_leb128(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Read back the custom sections of a module emitted by [`emit_module`].
///
/// Returns `None` if the bytes are not a wasm module.
pub fn custom_sections(module: &[u8]) -> Option<Vec<(String, Vec<u8>)>> {
    if module.len() < 8 || &module[0..4] != MAGIC || &module[4..8] != VERSION {
        return None;
    }
    let mut sections = Vec::new();
    let mut pos = 8;
    while pos < module.len() {
        let id = module[pos];
        pos += 1;
        let size = read_leb128(module, &mut pos)? as usize;
        let end = pos.checked_add(size).filter(|&e| e <= module.len())?;
        if id == CUSTOM_SECTION {
            let mut p = pos;
            let name_len = read_leb128(module, &mut p)? as usize;
            let name_end = p.checked_add(name_len).filter(|&e| e <= end)?;
            let name = String::from_utf8(module[p..name_end].to_vec()).ok()?;
            sections.push((name, module[name_end..end].to_vec()));
        }
        pos = end;
    }
    Some(sections)
}

fn read_leb128(bytes: &[u8], pos: &mut usize) -> Option<u64> {
    let mut result = 0u64;
    let mut shift = 0;
    loop {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some(result);
        }
        shift += 7;
        if shift >= 64 {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABI: WasmAbiVersion = WasmAbiVersion {
        version: 1,
        minor_version: 2,
    };

    #[test]
    fn module_has_wasm_header() {
        let module = emit_module(ABI, b"{}");
        assert_eq!(&module[0..4], b"\0asm");
        assert_eq!(&module[4..8], &[1, 0, 0, 0]);
    }

    #[test]
    fn sections_carry_abi_and_plan() {
        let plan = br#"{"entrypoints":[]}"#;
        let module = emit_module(ABI, plan);
        let sections = custom_sections(&module).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0, ABI_SECTION);
        assert_eq!(sections[0].1, br#"{"version":1,"minor_version":2}"#.to_vec());
        assert_eq!(sections[1].0, PLAN_SECTION);
        assert_eq!(sections[1].1, plan.to_vec());
    }

    #[test]
    fn large_payload_uses_multibyte_sizes() {
        let plan = vec![b'x'; 300];
        let module = emit_module(ABI, &plan);
        let sections = custom_sections(&module).unwrap();
        assert_eq!(sections[1].1.len(), 300);
    }

    #[test]
    fn rejects_non_wasm() {
        assert!(custom_sections(b"not a module").is_none());
    }
}
