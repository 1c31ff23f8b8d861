//! JavaScript sources evaluated by the Chromium driver.
//!
//! Every script is an IIFE returning an envelope: `{ ok: true, value }` or
//! `{ ok: false, kind, message }`. Literals are embedded through
//! `serde_json::to_string` so selectors and text never need manual escaping.

use serde::Serialize;

use crate::types::{ElementHandle, FrameHandle, SelectBy};

const PRELUDE: &str = r#"
const __fail = (kind, message) => ({ ok: false, kind, message });
const __resolveDoc = (chain) => {
  let doc = document;
  let ox = 0;
  let oy = 0;
  for (let i = 0; i < chain.length; i++) {
    const hop = chain[i];
    let host = null;
    try { host = doc.querySelectorAll(hop.selector)[hop.index] || null; } catch (e) { host = null; }
    if (!host) { return { error: __fail('detached', 'frame hop ' + i + ' missing: ' + hop.selector) }; }
    let inner = null;
    try { inner = host.contentDocument; } catch (e) { inner = null; }
    if (!inner) { return { error: __fail('detached', 'frame hop ' + i + ' has no accessible document') }; }
    const hr = host.getBoundingClientRect();
    ox += hr.x + (host.clientLeft || 0);
    oy += hr.y + (host.clientTop || 0);
    doc = inner;
  }
  return { doc, ox, oy };
};
const __visible = (el) => {
  if (!el || !el.isConnected) { return false; }
  const view = el.ownerDocument.defaultView;
  const style = view ? view.getComputedStyle(el) : null;
  if (style && (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0')) { return false; }
  const r = el.getBoundingClientRect();
  return r.width > 0 && r.height > 0;
};
const __enabled = (el) => !el.disabled && el.getAttribute('aria-disabled') !== 'true';
const __rect = (el) => { const r = el.getBoundingClientRect(); return { x: r.x, y: r.y, width: r.width, height: r.height }; };
const __text = (el) => String(el.innerText || el.value || el.getAttribute('aria-label') || el.getAttribute('title') || '').replace(/\s+/g, ' ').trim().slice(0, 300);
const __cssPath = (el) => {
  const parts = [];
  let node = el;
  while (node && node.nodeType === 1 && node !== node.ownerDocument.documentElement) {
    let n = 1;
    let sib = node.previousElementSibling;
    while (sib) { if (sib.tagName === node.tagName) { n++; } sib = sib.previousElementSibling; }
    parts.unshift(node.tagName.toLowerCase() + ':nth-of-type(' + n + ')');
    node = node.parentElement;
  }
  parts.unshift('html');
  return parts.join(' > ');
};
"#;

const CANDIDATES: &str = "a,button,input,select,textarea,label,summary,details,iframe,frame,[role],[onclick],[tabindex]:not([tabindex='-1']),[contenteditable='true']";

fn literal<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn in_frame(frame: &FrameHandle, body: &str) -> String {
    format!(
        "(() => {{\n{PRELUDE}\nconst __r = __resolveDoc({chain});\nif (__r.error) {{ return __r.error; }}\nconst doc = __r.doc;\n{body}\n}})()",
        chain = literal(frame.hops()),
    )
}

fn on_element(element: &ElementHandle, body: &str) -> String {
    let resolve = format!(
        "let el = null;\ntry {{ el = doc.querySelectorAll({sel})[{idx}] || null; }} catch (e) {{ return __fail('script', 'invalid selector'); }}\nif (!el) {{ return __fail('detached', 'element missing: ' + {sel}); }}\n{body}",
        sel = literal(&element.selector),
        idx = element.index,
    );
    in_frame(&element.frame, &resolve)
}

pub fn enumerate(frame: &FrameHandle) -> String {
    let body = format!(
        r#"const out = [];
for (const el of doc.querySelectorAll({candidates})) {{
  const tag = el.tagName.toLowerCase();
  const attributes = {{}};
  for (const a of Array.from(el.attributes).slice(0, 40)) {{ attributes[a.name] = String(a.value).slice(0, 300); }}
  out.push({{
    dom_path: __cssPath(el),
    tag,
    text: __text(el),
    attributes,
    visible: __visible(el),
    enabled: __enabled(el),
    rect: __rect(el),
    is_frame: tag === 'iframe' || tag === 'frame',
  }});
}}
return {{ ok: true, value: out }};"#,
        candidates = literal(CANDIDATES),
    );
    in_frame(frame, &body)
}

pub fn set_markers(frame: &FrameHandle, attr: &str, marks: &[(String, String)]) -> String {
    let body = format!(
        r#"const attr = {attr};
doc.querySelectorAll('[' + attr + ']').forEach((el) => el.removeAttribute(attr));
let count = 0;
for (const [sel, val] of {marks}) {{
  let el = null;
  try {{ el = doc.querySelector(sel); }} catch (e) {{ el = null; }}
  if (el) {{ el.setAttribute(attr, val); count++; }}
}}
return {{ ok: true, value: count }};"#,
        attr = literal(attr),
        marks = literal(marks),
    );
    in_frame(frame, &body)
}

pub fn count_matches(frame: &FrameHandle, selector: &str) -> String {
    let body = format!(
        "let n = 0;\ntry {{ n = doc.querySelectorAll({sel}).length; }} catch (e) {{ return __fail('script', 'invalid selector: ' + {sel}); }}\nreturn {{ ok: true, value: n }};",
        sel = literal(selector),
    );
    in_frame(frame, &body)
}

pub fn has_content_document(element: &ElementHandle) -> String {
    on_element(
        element,
        "let inner = null;\ntry { inner = el.contentDocument; } catch (e) { inner = null; }\nreturn { ok: true, value: !!inner };",
    )
}

pub fn element_state(element: &ElementHandle) -> String {
    on_element(
        element,
        r#"const tag = el.tagName.toLowerCase();
const editable = (tag === 'input' || tag === 'textarea' || el.isContentEditable) && __enabled(el) && !el.readOnly;
return { ok: true, value: {
  attached: el.isConnected,
  visible: __visible(el),
  enabled: __enabled(el),
  editable,
  tag,
  input_type: tag === 'input' ? String(el.getAttribute('type') || 'text').toLowerCase() : null,
  href: tag === 'a' ? el.getAttribute('href') : null,
  target: el.getAttribute('target'),
  value: ('value' in el) ? String(el.value) : null,
  rect: __rect(el),
} };"#,
    )
}

pub fn scroll_into_view(element: &ElementHandle) -> String {
    on_element(
        element,
        "el.scrollIntoView({ block: 'center', inline: 'center', behavior: 'instant' });\nreturn { ok: true, value: null };",
    )
}

pub fn is_visible(element: &ElementHandle) -> String {
    on_element(element, "return { ok: true, value: __visible(el) };")
}

pub fn obstruction(element: &ElementHandle) -> String {
    on_element(
        element,
        r#"const r = el.getBoundingClientRect();
const hit = doc.elementFromPoint(r.x + r.width / 2, r.y + r.height / 2);
if (!hit || hit === el || el.contains(hit) || hit.contains(el)) { return { ok: true, value: null }; }
const id = hit.id ? '#' + hit.id : '';
const cls = hit.getAttribute('class') ? '.' + hit.getAttribute('class').trim().split(/\s+/).join('.') : '';
return { ok: true, value: { selector: __cssPath(hit), tag: hit.tagName.toLowerCase(), description: hit.tagName.toLowerCase() + id + cls } };"#,
    )
}

pub fn dismiss(blocker: &ElementHandle) -> String {
    on_element(
        blocker,
        r#"const root = el.closest('[role=dialog],[aria-modal=true],.modal,.overlay,.popup,[class*=cookie],[id*=cookie],[class*=consent]') || el;
const close = root.querySelector('[aria-label*="close" i],[aria-label*="dismiss" i],[title*="close" i],.close,[class*="close"],[data-dismiss]');
if (close) { close.click(); return { ok: true, value: 'close' }; }
const esc = { key: 'Escape', code: 'Escape', keyCode: 27, bubbles: true };
(doc.activeElement || doc.body).dispatchEvent(new KeyboardEvent('keydown', esc));
(doc.activeElement || doc.body).dispatchEvent(new KeyboardEvent('keyup', esc));
return { ok: true, value: 'escape' };"#,
    )
}

/// Blocker is gone when it detached or is no longer visible.
pub fn blocker_gone(blocker: &ElementHandle) -> String {
    let body = format!(
        "let el = null;\ntry {{ el = doc.querySelectorAll({sel})[{idx}] || null; }} catch (e) {{ el = null; }}\nreturn {{ ok: true, value: !el || !__visible(el) }};",
        sel = literal(&blocker.selector),
        idx = blocker.index,
    );
    in_frame(&blocker.frame, &body)
}

/// Point to press in top-level viewport coordinates.
pub fn click_point(element: &ElementHandle, offset: Option<(f64, f64)>) -> String {
    let offset = match offset {
        Some((x, y)) => format!("{{ x: {x}, y: {y} }}"),
        None => "null".to_string(),
    };
    on_element(
        element,
        &format!(
            r#"const r = el.getBoundingClientRect();
if (r.width <= 0 || r.height <= 0) {{ return {{ ok: true, value: null }}; }}
const off = {offset};
const x = off ? r.x + off.x : r.x + r.width / 2;
const y = off ? r.y + off.y : r.y + r.height / 2;
return {{ ok: true, value: {{ x: x + __r.ox, y: y + __r.oy }} }};"#
        ),
    )
}

pub fn dom_click(element: &ElementHandle) -> String {
    on_element(element, "el.click();\nreturn { ok: true, value: null };")
}

pub fn focus(element: &ElementHandle) -> String {
    on_element(element, "el.focus();\nreturn { ok: true, value: null };")
}

pub fn fill(element: &ElementHandle, text: &str) -> String {
    on_element(
        element,
        &format!(
            r#"const text = {text};
el.focus();
if (el.isContentEditable) {{
  el.textContent = text;
}} else {{
  const view = el.ownerDocument.defaultView;
  const proto = el.tagName === 'TEXTAREA' ? view.HTMLTextAreaElement.prototype : view.HTMLInputElement.prototype;
  const desc = Object.getOwnPropertyDescriptor(proto, 'value');
  if (desc && desc.set) {{ desc.set.call(el, text); }} else {{ el.value = text; }}
}}
el.dispatchEvent(new Event('input', {{ bubbles: true }}));
el.dispatchEvent(new Event('change', {{ bubbles: true }}));
return {{ ok: true, value: null }};"#,
            text = literal(text),
        ),
    )
}

pub fn commit_input(element: &ElementHandle) -> String {
    on_element(
        element,
        "el.dispatchEvent(new Event('change', { bubbles: true }));\nreturn { ok: true, value: null };",
    )
}

pub fn input_value(element: &ElementHandle) -> String {
    on_element(
        element,
        "return { ok: true, value: el.isContentEditable ? String(el.textContent || '') : String(el.value ?? '') };",
    )
}

pub fn select_native(element: &ElementHandle, by: &SelectBy) -> String {
    on_element(
        element,
        &format!(
            r#"if (el.tagName !== 'SELECT') {{ return __fail('not_interactable', 'element is not a native select'); }}
const by = {by};
const opts = Array.from(el.options);
const label = (o) => String(o.label || o.text || '').trim();
let idx = -1;
if (by.by === 'index') {{ idx = by.value < opts.length ? by.value : -1; }}
else if (by.by === 'value') {{ idx = opts.findIndex((o) => o.value === by.value); }}
else {{ const want = String(by.value).trim().toLowerCase(); idx = opts.findIndex((o) => label(o).toLowerCase() === want); }}
if (idx < 0 || opts[idx].disabled) {{ return __fail('option_not_found', 'no selectable option for ' + JSON.stringify(by)); }}
el.selectedIndex = idx;
el.dispatchEvent(new Event('input', {{ bubbles: true }}));
el.dispatchEvent(new Event('change', {{ bubbles: true }}));
return {{ ok: true, value: {{ index: idx, value: opts[idx].value, label: label(opts[idx]) }} }};"#,
            by = literal(by),
        ),
    )
}

pub fn dropdown_snapshot(frame: &FrameHandle) -> String {
    in_frame(
        frame,
        r#"const nodes = Array.from(doc.querySelectorAll('[role=option],[role=menuitem],[role=listbox] li,[class*=dropdown] li,[class*=menu] li')).filter(__visible);
const options = nodes.slice(0, 200).map((n) => ({
  selector: __cssPath(n),
  text: String(n.innerText || n.textContent || '').replace(/\s+/g, ' ').trim(),
  value: n.getAttribute('data-value') || n.getAttribute('value'),
}));
const search = Array.from(doc.querySelectorAll('input[type=search],[role=searchbox],[role=combobox] input,input[aria-autocomplete]')).find(__visible);
return { ok: true, value: { options, search: search ? __cssPath(search) : null } };"#,
    )
}

pub const PAGE_METRICS: &str = "(() => ({ ok: true, value: { scroll_y: window.scrollY, viewport_height: window.innerHeight, document_height: Math.max(document.documentElement.scrollHeight, document.body ? document.body.scrollHeight : 0) } }))()";

pub fn scroll_to(y: f64) -> String {
    format!("(() => {{ window.scrollTo(0, {y}); return {{ ok: true, value: null }}; }})()")
}
