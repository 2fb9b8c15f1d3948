//! Scope-relative DOM access through an injected control arena.
//!
//! A [`ScopeRef`] names the document under inspection: the main document or
//! one iframe in document order. [`DomScope`] runs collection passes that
//! snapshot a scope's controls/anchors/clickables into plain metadata and
//! park the live nodes in page-global registries; later mutations address
//! nodes by registry index, so the engine never holds driver-specific
//! element objects. Cross-origin frames fail closed: every operation
//! returns its empty value for a scope it cannot read.
//!
//! Value writes go through the native property setter of the element's own
//! realm and dispatch `input`/`change`/`blur`, so reactive form scripts
//! (client-side validation, formatted-input libraries) observe the change.

use crate::error::Result;
use crate::session::Session;
use serde::{Deserialize, Serialize};

/// The document a lookup runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeRef {
    /// Top-level document
    Main,
    /// Iframe by document order
    Frame(usize),
}

impl ScopeRef {
    fn frame_index_js(self) -> String {
        match self {
            Self::Main => "null".to_string(),
            Self::Frame(i) => i.to_string(),
        }
    }
}

impl std::fmt::Display for ScopeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Frame(i) => write!(f, "frame[{i}]"),
        }
    }
}

/// Snapshot of one form control, addressed by registry index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlMeta {
    pub index: usize,
    pub tag: String,
    pub input_type: String,
    pub name: String,
    pub id: String,
    pub label: String,
    pub visible: bool,
    pub enabled: bool,
    pub value: String,
    pub max_length: i64,
    #[serde(default)]
    pub options: Vec<String>,
    pub checked: bool,
    pub form_index: i64,
}

impl ControlMeta {
    pub fn is_textarea(&self) -> bool {
        self.tag == "textarea"
    }

    /// Single-line text-like input (the types a profile string can go into).
    pub fn is_text_input(&self) -> bool {
        self.tag == "input"
            && matches!(
                self.input_type.as_str(),
                "text" | "email" | "tel" | "url" | "number" | "search" | ""
            )
    }

    /// Any control accepting free text.
    pub fn is_text_entry(&self) -> bool {
        self.is_textarea() || self.is_text_input()
    }

    pub fn is_select(&self) -> bool {
        self.tag == "select"
    }

    pub fn is_radio(&self) -> bool {
        self.tag == "input" && self.input_type == "radio"
    }

    pub fn is_checkbox(&self) -> bool {
        self.tag == "input" && self.input_type == "checkbox"
    }

    /// Writable from the pipeline's point of view.
    pub fn fillable(&self) -> bool {
        self.visible && self.enabled
    }

    /// Name and id joined for keyword matching, lowercased.
    pub fn name_id(&self) -> String {
        format!("{} {}", self.name, self.id).to_lowercase()
    }
}

/// Snapshot of one anchor. `href` is already resolved to an absolute URL
/// by the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorMeta {
    pub index: usize,
    pub href: String,
    pub text: String,
}

/// Snapshot of one submit-candidate element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickableMeta {
    pub index: usize,
    pub tag: String,
    pub input_type: String,
    pub text: String,
    pub value: String,
    pub alt: String,
    pub href: String,
    pub visible: bool,
    pub enabled: bool,
    pub form_index: i64,
}

/// Result of a clickable collection pass: per-form control counts plus the
/// candidates themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickableScan {
    pub form_counts: Vec<usize>,
    pub items: Vec<ClickableMeta>,
}

/// Viewport rectangle in page coordinates, for screenshot clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Result of an image-CAPTCHA scan.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptchaScan {
    pub rect: Rect,
    pub has_answer_input: bool,
}

/// Selector for the element marked by [`DomScope::mark_clickable`].
pub const PICK_MARKER_SELECTOR: &str = "[data-tw-pick='1']";

const PRELUDE_JS: &str = r#"
const doc = (() => {
  const frameIndex = __FRAME_INDEX__;
  if (frameIndex === null) return document;
  const frames = document.querySelectorAll('iframe');
  if (frameIndex >= frames.length) return null;
  try {
    const inner = frames[frameIndex].contentDocument;
    return inner && inner.body ? inner : null;
  } catch (e) { return null; }
})();
if (!doc) return __FALLBACK__;
const visible = (el) => {
  if (!el) return false;
  const win = el.ownerDocument.defaultView || window;
  const style = win.getComputedStyle(el);
  if (style.display === 'none' || style.visibility === 'hidden') return false;
  return !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
};
"#;

const PROBE_FORM_UI_JS: &str = r"
const textareas = Array.from(doc.querySelectorAll('textarea'));
if (textareas.some(visible)) return true;
const formControls = Array.from(doc.querySelectorAll('form input, form select'));
return formControls.some((el) => visible(el) && el.type !== 'hidden');
";

const BODY_TEXT_JS: &str = r"
return (doc.body ? doc.body.innerText : '').slice(0, __LIMIT__);
";

const COLLECT_CONTROLS_JS: &str = r#"
const nodes = Array.from(doc.querySelectorAll('input, textarea, select'));
window.__twControls = nodes;
const labelFor = (el) => {
  if (el.id) {
    try {
      const lab = doc.querySelector('label[for="' + CSS.escape(el.id) + '"]');
      if (lab) return lab.innerText;
    } catch (e) {}
  }
  const wrap = el.closest('label');
  if (wrap) return wrap.innerText;
  const prev = el.previousElementSibling;
  if (prev && (prev.tagName === 'LABEL' || prev.tagName === 'SPAN' || prev.tagName === 'DT')) {
    return prev.innerText;
  }
  const cell = el.closest('td');
  if (cell) {
    const row = cell.closest('tr');
    const head = row ? row.querySelector('th') : null;
    if (head) return head.innerText;
  }
  const dd = el.closest('dd');
  if (dd && dd.previousElementSibling && dd.previousElementSibling.tagName === 'DT') {
    return dd.previousElementSibling.innerText;
  }
  return '';
};
return nodes.map((el, index) => ({
  index,
  tag: el.tagName.toLowerCase(),
  inputType: (el.getAttribute('type') || (el.tagName === 'INPUT' ? 'text' : '')).toLowerCase(),
  name: el.getAttribute('name') || '',
  id: el.id || '',
  label: (labelFor(el) || '').trim().slice(0, 120),
  visible: visible(el),
  enabled: !el.disabled && !el.readOnly,
  value: (el.value || '').slice(0, 500),
  maxLength: el.maxLength && el.maxLength > 0 ? el.maxLength : -1,
  options: el.tagName === 'SELECT'
    ? Array.from(el.options).map((o) => (o.text || '').trim().slice(0, 80))
    : [],
  checked: !!el.checked,
  formIndex: el.form ? Array.prototype.indexOf.call(doc.forms, el.form) : -1
}));
"#;

const COLLECT_ANCHORS_JS: &str = r"
const anchors = Array.from(doc.querySelectorAll('a[href]'));
return anchors.map((el, index) => ({
  index,
  href: el.href || '',
  text: (el.innerText || '').trim().slice(0, 120)
}));
";

const COLLECT_CLICKABLES_JS: &str = r"
const forms = Array.from(doc.forms);
const formCounts = forms.map(
  (f) => f.querySelectorAll('input:not([type=hidden]), textarea, select').length
);
const nodes = Array.from(doc.querySelectorAll(
  'button, input[type=submit], input[type=button], input[type=image], a[href], [role=button], [onclick]'
));
window.__twClickables = nodes;
const items = nodes.map((el, index) => {
  const owner = el.form || el.closest('form');
  return {
    index,
    tag: el.tagName.toLowerCase(),
    inputType: (el.getAttribute('type') || '').toLowerCase(),
    text: ((el.innerText || el.value || '') + '').trim().slice(0, 120),
    value: (el.getAttribute('value') || '').slice(0, 120),
    alt: (el.getAttribute('alt') || '').slice(0, 120),
    href: el.tagName === 'A' ? (el.getAttribute('href') || '') : '',
    visible: visible(el),
    enabled: !el.disabled,
    formIndex: owner ? forms.indexOf(owner) : -1
  };
});
return { formCounts, items };
";

const WRITE_VALUE_JS: &str = r"
const el = (window.__twControls || [])[__INDEX__];
if (!el) return false;
const value = __VALUE__;
const win = el.ownerDocument.defaultView || window;
const tag = el.tagName;
let proto = null;
if (tag === 'TEXTAREA') proto = win.HTMLTextAreaElement.prototype;
else if (tag === 'INPUT') proto = win.HTMLInputElement.prototype;
else if (tag === 'SELECT') proto = win.HTMLSelectElement.prototype;
const desc = proto ? Object.getOwnPropertyDescriptor(proto, 'value') : null;
if (desc && desc.set) { desc.set.call(el, value); } else { el.value = value; }
for (const type of ['input', 'change', 'blur']) {
  el.dispatchEvent(new win.Event(type, { bubbles: true }));
}
return true;
";

const SELECT_INDEX_JS: &str = r"
const el = (window.__twControls || [])[__INDEX__];
if (!el || el.tagName !== 'SELECT') return false;
const option = __OPTION__;
if (option < 0 || option >= el.options.length) return false;
el.selectedIndex = option;
const win = el.ownerDocument.defaultView || window;
for (const type of ['input', 'change']) {
  el.dispatchEvent(new win.Event(type, { bubbles: true }));
}
return true;
";

const SET_CHECKED_JS: &str = r"
const el = (window.__twControls || [])[__INDEX__];
if (!el) return false;
const want = __WANT__;
if (!!el.checked !== want) {
  el.click();
  if (!!el.checked !== want) {
    el.checked = want;
    const win = el.ownerDocument.defaultView || window;
    el.dispatchEvent(new win.Event('change', { bubbles: true }));
  }
}
return !!el.checked === want;
";

const CLICK_CLICKABLE_JS: &str = r"
const el = (window.__twClickables || [])[__INDEX__];
if (!el) return false;
try { el.scrollIntoView({ block: 'center' }); } catch (e) {}
el.click();
return true;
";

const MARK_CLICKABLE_JS: &str = r"
const el = (window.__twClickables || [])[__INDEX__];
if (!el) return false;
for (const prev of document.querySelectorAll('[data-tw-pick]')) {
  prev.removeAttribute('data-tw-pick');
}
el.setAttribute('data-tw-pick', '1');
try { el.scrollIntoView({ block: 'center' }); } catch (e) {}
return true;
";

const SUBMIT_FORM_JS: &str = r"
const form = doc.forms[__INDEX__];
if (!form) return false;
if (form.requestSubmit) { form.requestSubmit(); } else { form.submit(); }
return true;
";

const SCAN_CAPTCHA_JS: &str = r"
const selectors = __SELECTORS__;
let image = null;
for (const sel of selectors) {
  let found = [];
  try { found = Array.from(doc.querySelectorAll(sel)); } catch (e) { continue; }
  const vis = found.find((el) => el.tagName === 'IMG' && visible(el));
  if (vis) { image = vis; break; }
}
if (!image) return null;
try { image.scrollIntoView({ block: 'center' }); } catch (e) {}
const answer = (() => {
  const root = image.closest('form') || doc;
  const inputs = Array.from(root.querySelectorAll('input'));
  return inputs.find((el) => {
    if (el.type && el.type !== 'text') return false;
    const key = ((el.getAttribute('name') || '') + ' ' + (el.id || '')).toLowerCase();
    return key.includes('captcha') && visible(el);
  }) || null;
})();
window.__twCaptcha = [image, answer];
const r = image.getBoundingClientRect();
let offsetX = window.scrollX;
let offsetY = window.scrollY;
const frameIdx = __FRAME_INDEX__;
if (frameIdx !== null) {
  const frame = document.querySelectorAll('iframe')[frameIdx];
  if (frame) {
    const fr = frame.getBoundingClientRect();
    offsetX += fr.x;
    offsetY += fr.y;
  }
}
return {
  rect: { x: r.x + offsetX, y: r.y + offsetY, width: r.width, height: r.height },
  hasAnswerInput: !!answer
};
";

const WRITE_CAPTCHA_ANSWER_JS: &str = r"
const pair = window.__twCaptcha || [];
const el = pair[1];
if (!el) return false;
const value = __VALUE__;
const win = el.ownerDocument.defaultView || window;
const desc = Object.getOwnPropertyDescriptor(win.HTMLInputElement.prototype, 'value');
if (desc && desc.set) { desc.set.call(el, value); } else { el.value = value; }
for (const type of ['input', 'change', 'blur']) {
  el.dispatchEvent(new win.Event(type, { bubbles: true }));
}
return true;
";

const QUERY_ANY_JS: &str = r"
const selectors = __SELECTORS__;
for (const sel of selectors) {
  try { if (doc.querySelector(sel)) return true; } catch (e) {}
}
return false;
";

/// A scope-bound view over one document, main or frame.
pub struct DomScope<'a> {
    session: &'a Session,
    scope: ScopeRef,
}

impl<'a> DomScope<'a> {
    pub(crate) fn new(session: &'a Session, scope: ScopeRef) -> Self {
        Self { session, scope }
    }

    fn script(&self, body: &str, fallback: &str) -> String {
        let prelude = PRELUDE_JS
            .replace("__FRAME_INDEX__", &self.scope.frame_index_js())
            .replace("__FALLBACK__", fallback);
        format!("(() => {{ {prelude}\n{body} }})()")
    }

    /// Whether the scope shows form UI: a visible textarea, or a visible
    /// non-hidden input/select inside an actual form element.
    pub async fn probe_form_ui(&self) -> Result<bool> {
        self.session
            .evaluate(&self.script(PROBE_FORM_UI_JS, "false"))
            .await
    }

    /// Rendered body text of this scope's document, truncated in the page
    /// context.
    pub async fn body_text(&self, limit: usize) -> Result<String> {
        let body = BODY_TEXT_JS.replace("__LIMIT__", &limit.to_string());
        self.session.evaluate(&self.script(&body, "''")).await
    }

    /// Snapshot every input/textarea/select into the control registry.
    pub async fn collect_controls(&self) -> Result<Vec<ControlMeta>> {
        self.session
            .evaluate(&self.script(COLLECT_CONTROLS_JS, "[]"))
            .await
    }

    /// Snapshot every anchor with an href.
    pub async fn collect_anchors(&self) -> Result<Vec<AnchorMeta>> {
        self.session
            .evaluate(&self.script(COLLECT_ANCHORS_JS, "[]"))
            .await
    }

    /// Snapshot submit candidates plus per-form control density.
    pub async fn collect_clickables(&self) -> Result<ClickableScan> {
        self.session
            .evaluate(&self.script(
                COLLECT_CLICKABLES_JS,
                "{ formCounts: [], items: [] }",
            ))
            .await
    }

    /// Write a value into a collected control through the native setter,
    /// dispatching input/change/blur.
    pub async fn write_value(&self, index: usize, value: &str) -> Result<bool> {
        let body = WRITE_VALUE_JS
            .replace("__INDEX__", &index.to_string())
            .replace("__VALUE__", &js_string(value));
        self.session.evaluate(&self.script(&body, "false")).await
    }

    /// Select an option by index on a collected select control.
    pub async fn select_index(&self, index: usize, option: usize) -> Result<bool> {
        let body = SELECT_INDEX_JS
            .replace("__INDEX__", &index.to_string())
            .replace("__OPTION__", &option.to_string());
        self.session.evaluate(&self.script(&body, "false")).await
    }

    /// Drive a checkbox/radio to the wanted state, preferring a click so
    /// label handlers fire.
    pub async fn set_checked(&self, index: usize, want: bool) -> Result<bool> {
        let body = SET_CHECKED_JS
            .replace("__INDEX__", &index.to_string())
            .replace("__WANT__", if want { "true" } else { "false" });
        self.session.evaluate(&self.script(&body, "false")).await
    }

    /// Script-dispatched click on a collected clickable.
    pub async fn click_clickable(&self, index: usize) -> Result<bool> {
        let body = CLICK_CLICKABLE_JS.replace("__INDEX__", &index.to_string());
        self.session.evaluate(&self.script(&body, "false")).await
    }

    /// Tag a collected clickable with the pick marker so a trusted-input
    /// click can find it by selector. Main scope only; selector lookups do
    /// not descend into frames.
    pub async fn mark_clickable(&self, index: usize) -> Result<bool> {
        let body = MARK_CLICKABLE_JS.replace("__INDEX__", &index.to_string());
        self.session.evaluate(&self.script(&body, "false")).await
    }

    /// Invoke native submission on the scope's nth form.
    pub async fn submit_form(&self, form_index: usize) -> Result<bool> {
        let body = SUBMIT_FORM_JS.replace("__INDEX__", &form_index.to_string());
        self.session.evaluate(&self.script(&body, "false")).await
    }

    /// Find the first visible CAPTCHA image matching the selector list and
    /// its paired answer input. The returned rect is in page coordinates
    /// (frame offsets applied) for screenshot clipping.
    pub async fn scan_captcha_image(&self, selectors: &[String]) -> Result<Option<CaptchaScan>> {
        let body = SCAN_CAPTCHA_JS
            .replace("__SELECTORS__", &js_string_array(selectors))
            .replace("__FRAME_INDEX__", &self.scope.frame_index_js());
        self.session.evaluate(&self.script(&body, "null")).await
    }

    /// Write recognized text into the answer input found by the last
    /// [`Self::scan_captcha_image`] pass.
    pub async fn write_captcha_answer(&self, text: &str) -> Result<bool> {
        let body = WRITE_CAPTCHA_ANSWER_JS.replace("__VALUE__", &js_string(text));
        self.session.evaluate(&self.script(&body, "false")).await
    }

    /// Whether any of the selectors matches in this scope.
    pub async fn query_any(&self, selectors: &[String]) -> Result<bool> {
        let body = QUERY_ANY_JS.replace("__SELECTORS__", &js_string_array(selectors));
        self.session.evaluate(&self.script(&body, "false")).await
    }
}

/// Encode a Rust string as a JS string literal.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Encode a Rust slice as a JS array-of-strings literal.
fn js_string_array(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_meta_predicates() {
        let meta = ControlMeta {
            index: 0,
            tag: "input".to_string(),
            input_type: "email".to_string(),
            name: "your-email".to_string(),
            id: "email".to_string(),
            label: "メールアドレス".to_string(),
            visible: true,
            enabled: true,
            value: String::new(),
            max_length: -1,
            options: Vec::new(),
            checked: false,
            form_index: 0,
        };
        assert!(meta.is_text_input());
        assert!(meta.is_text_entry());
        assert!(!meta.is_textarea());
        assert!(meta.fillable());
        assert_eq!(meta.name_id(), "your-email email");
    }

    #[test]
    fn test_control_meta_deserializes_bridge_shape() {
        let json = r#"{
            "index": 3,
            "tag": "select",
            "inputType": "",
            "name": "pref",
            "id": "",
            "label": "都道府県",
            "visible": true,
            "enabled": true,
            "value": "",
            "maxLength": -1,
            "options": ["選択してください", "東京都", "大阪府"],
            "checked": false,
            "formIndex": 0
        }"#;
        let meta: ControlMeta = serde_json::from_str(json).expect("parse control meta");
        assert!(meta.is_select());
        assert_eq!(meta.options.len(), 3);
        assert_eq!(meta.form_index, 0);
    }

    #[test]
    fn test_clickable_scan_deserializes_bridge_shape() {
        let json = r#"{
            "formCounts": [5, 1],
            "items": [{
                "index": 0,
                "tag": "button",
                "inputType": "submit",
                "text": "送信する",
                "value": "",
                "alt": "",
                "href": "",
                "visible": true,
                "enabled": true,
                "formIndex": 0
            }]
        }"#;
        let scan: ClickableScan = serde_json::from_str(json).expect("parse clickable scan");
        assert_eq!(scan.form_counts, vec![5, 1]);
        assert_eq!(scan.items[0].text, "送信する");
    }

    #[test]
    fn test_js_string_escaping() {
        assert_eq!(js_string("a\"b"), "\"a\\\"b\"");
        assert_eq!(js_string("line\nbreak"), "\"line\\nbreak\"");
    }

    #[test]
    fn test_script_injects_frame_index() {
        // Registry scripts must resolve the right document per scope
        let main = ScopeRef::Main.frame_index_js();
        let frame = ScopeRef::Frame(2).frame_index_js();
        assert_eq!(main, "null");
        assert_eq!(frame, "2");
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(ScopeRef::Main.to_string(), "main");
        assert_eq!(ScopeRef::Frame(1).to_string(), "frame[1]");
    }
}
