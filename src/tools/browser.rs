//! Chrome 浏览器能力：使用 Headless Chrome 实现 BrowserCapability
//!
//! 需启用 feature "browser" 且系统已安装 Chrome/Chromium。
//! 元素按「当前可见元素列表中的序号」定位，与快照中的 index 一致；页面脚本统一返回 JSON.stringify 的结果。
//! headless_chrome 是同步 API，所有页面操作在 spawn_blocking 中执行。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;

use crate::config::BrowserSection;
use crate::core::AgentError;
use crate::tools::{BlockingLane, BrowserCapability, CapabilityResult, ScrollDirection, ToolOutcome};

/// 快照中最多返回的元素数
const SNAPSHOT_MAX_ELEMENTS: usize = 50;
/// 长文本最多返回的字符数
const ELEMENT_TEXT_MAX_CHARS: usize = 2000;

/// 可见性判断（各脚本共用）
const VISIBLE_JS: &str = r#"
function isVisible(el, minW, minH) {
    try {
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        return rect.width > minW && rect.height > minH &&
            style.display !== 'none' && style.visibility !== 'hidden';
    } catch (e) {
        return false;
    }
}
function visibleList(selectors, minW, minH) {
    return Array.from(document.querySelectorAll(selectors)).filter(el => isVisible(el, minW, minH));
}
"#;

const INTERACTIVE_SELECTORS: &str = r#"a, button, input, textarea, select, [role="button"], [role="link"]"#;

/// 把 Rust 值编码为 JS 字面量
fn js_literal<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// 执行脚本并解析返回的 JSON 字符串
fn run_script(tab: &Tab, body: &str) -> Result<Value, String> {
    let script = format!("(() => {{ {VISIBLE_JS}\n{body} }})()");
    let result = tab
        .evaluate(&script, false)
        .map_err(|e| format!("Ошибка выполнения скрипта: {}", e))?;
    match result.value {
        Some(Value::String(s)) => serde_json::from_str(&s).or(Ok(Value::String(s))),
        Some(other) => Ok(other),
        None => Ok(Value::Null),
    }
}

fn found(value: &Value) -> bool {
    value.get("found").and_then(Value::as_bool).unwrap_or(false)
}

fn text_of(value: &Value, key: &str) -> String {
    value.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

/// 补全协议头
fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("file://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Chrome 浏览器：单一标签页
pub struct ChromeBrowser {
    browser: Mutex<Option<Browser>>,
    tab: Arc<Tab>,
    lane: BlockingLane,
}

impl ChromeBrowser {
    /// 按 [browser] 段启动 Chrome 并打开一个标签页
    pub fn launch(section: &BrowserSection) -> Result<Self, AgentError> {
        let options = LaunchOptions::default_builder()
            .headless(section.headless)
            .window_size(Some((section.window_width, section.window_height)))
            .idle_browser_timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| AgentError::Browser(format!("Chrome options: {}", e)))?;
        let browser = Browser::new(options)
            .map_err(|e| AgentError::Browser(format!("Chrome launch failed: {}. Install Chrome/Chromium.", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| AgentError::Browser(format!("Browser tab failed: {}", e)))?;
        tracing::info!(headless = section.headless, "chrome launched");
        Ok(Self {
            browser: Mutex::new(Some(browser)),
            tab,
            lane: BlockingLane::new(),
        })
    }

    /// 关闭浏览器进程（可重复调用）
    pub fn close(&self) {
        if let Ok(mut guard) = self.browser.lock() {
            if guard.take().is_some() {
                tracing::info!("chrome closed");
            }
        }
    }

    /// 在阻塞线程中独占操作标签页
    async fn with_tab<F>(&self, f: F) -> CapabilityResult
    where
        F: FnOnce(&Tab) -> CapabilityResult + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        self.lane.run(move || f(&tab)).await
    }
}

impl Drop for ChromeBrowser {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl BrowserCapability for ChromeBrowser {
    async fn navigate(&self, url: &str) -> CapabilityResult {
        let url = normalize_url(url);
        tracing::info!(url = %url, "navigate");
        self.with_tab(move |tab| {
            tab.navigate_to(&url)
                .and_then(|t| t.wait_until_navigated())
                .map_err(|e| format!("Ошибка навигации: {}", e))?;
            std::thread::sleep(Duration::from_millis(1500));
            Ok(ToolOutcome::ok(format!("Перешли на {}", url)).with("url", tab.get_url()))
        })
        .await
    }

    async fn extract_page_snapshot(&self) -> CapabilityResult {
        self.with_tab(|tab| {
            let body = format!(
                r#"
                const elements = [];
                Array.from(document.querySelectorAll({selectors})).forEach(el => {{
                    try {{
                        const rect = el.getBoundingClientRect();
                        if (isVisible(el, 10, 10) && rect.top >= 0 && rect.bottom <= window.innerHeight) {{
                            elements.push({{
                                index: elements.length,
                                type: el.tagName.toLowerCase(),
                                inputType: el.type || '',
                                text: (el.textContent || '').trim().substring(0, 100),
                                href: el.href || '',
                                placeholder: el.placeholder || '',
                                value: el.value || ''
                            }});
                        }}
                    }} catch (e) {{}}
                }});
                return JSON.stringify({{
                    title: document.title,
                    url: window.location.href,
                    elements: elements.slice(0, {max})
                }});
                "#,
                selectors = js_literal(&INTERACTIVE_SELECTORS),
                max = SNAPSHOT_MAX_ELEMENTS
            );
            let page = run_script(tab, &body)?;
            let elements = page.get("elements").cloned().unwrap_or_else(|| Value::Array(Vec::new()));
            let count = elements.as_array().map(Vec::len).unwrap_or(0);
            tracing::info!(elements = count, "snapshot");
            Ok(ToolOutcome::ok(format!("Извлечено {} элементов со страницы", count))
                .with("title", text_of(&page, "title"))
                .with("url", text_of(&page, "url"))
                .with("element_count", count)
                .with("elements", elements))
        })
        .await
    }

    async fn click_element_by_index(&self, index: usize) -> CapabilityResult {
        self.with_tab(move |tab| {
            let body = format!(
                r#"
                const list = visibleList({selectors}, 10, 10);
                if ({index} >= list.length) return JSON.stringify({{found: false}});
                const el = list[{index}];
                el.scrollIntoView({{block: 'center'}});
                el.click();
                return JSON.stringify({{found: true, text: (el.textContent || '').trim().substring(0, 50)}});
                "#,
                selectors = js_literal(&INTERACTIVE_SELECTORS),
            );
            let result = run_script(tab, &body)?;
            if !found(&result) {
                return Ok(ToolOutcome::failure(format!("Элемент #{} не найден", index)));
            }
            std::thread::sleep(Duration::from_secs(1));
            Ok(ToolOutcome::ok(format!(
                "Кликнули по элементу #{}: {}",
                index,
                text_of(&result, "text")
            )))
        })
        .await
    }

    async fn fill_field_by_index(&self, index: usize, value: &str) -> CapabilityResult {
        let literal = js_literal(&value);
        self.with_tab(move |tab| {
            let body = format!(
                r#"
                const list = visibleList('input, textarea, [contenteditable]', 10, 10);
                if ({index} >= list.length) return JSON.stringify({{found: false}});
                const field = list[{index}];
                field.focus();
                if ('value' in field) {{ field.value = {literal}; }} else {{ field.textContent = {literal}; }}
                field.dispatchEvent(new Event('input', {{bubbles: true}}));
                field.dispatchEvent(new Event('change', {{bubbles: true}}));
                return JSON.stringify({{found: true}});
                "#
            );
            let result = run_script(tab, &body)?;
            if !found(&result) {
                return Ok(ToolOutcome::failure(format!("Поле #{} не найдено", index)));
            }
            std::thread::sleep(Duration::from_millis(500));
            Ok(ToolOutcome::ok(format!("Заполнили поле #{}", index)))
        })
        .await
    }

    async fn extract_list_items(&self, max_count: usize) -> CapabilityResult {
        self.with_tab(move |tab| {
            let body = format!(
                r#"
                const isCard = child => {{
                    const rect = child.getBoundingClientRect();
                    return rect.width > 100 && rect.height > 50;
                }};
                const container = Array.from(document.querySelectorAll('div, section, article, ul, ol'))
                    .find(c => {{
                        const n = Array.from(c.children).filter(isCard).length;
                        return n >= 2 && n <= 50;
                    }});
                if (!container) return JSON.stringify([]);
                const items = Array.from(container.children).filter(isCard).slice(0, {max_count});
                return JSON.stringify(items.map((item, idx) => {{
                    const walker = document.createTreeWalker(item, NodeFilter.SHOW_TEXT, null, false);
                    const texts = [];
                    while (walker.nextNode()) {{
                        const t = walker.currentNode.textContent.trim();
                        if (t.length > 2 && t.length < 200) texts.push(t);
                    }}
                    const links = Array.from(item.querySelectorAll('a')).map(a => a.href || '').filter(Boolean);
                    return {{index: idx, texts: texts.slice(0, 5), links: links.slice(0, 2)}};
                }}));
                "#
            );
            let items = run_script(tab, &body)?;
            let items = items.as_array().cloned().unwrap_or_default();
            let formatted: Vec<String> = items
                .iter()
                .map(|item| {
                    let texts: Vec<&str> = item
                        .get("texts")
                        .and_then(Value::as_array)
                        .map(|t| t.iter().filter_map(Value::as_str).collect())
                        .unwrap_or_default();
                    format!(
                        "[{}] {}",
                        item.get("index").and_then(Value::as_u64).unwrap_or(0),
                        texts.join(" | ")
                    )
                })
                .collect();
            Ok(ToolOutcome::ok(format!("Извлечено {} элементов списка", items.len()))
                .with("count", items.len())
                .with("formatted_items", formatted)
                .with("items", items))
        })
        .await
    }

    async fn extract_table_data(&self, max_rows: usize) -> CapabilityResult {
        self.with_tab(move |tab| {
            let body = format!(
                r#"
                const table = document.querySelector('table');
                if (!table) return JSON.stringify({{headers: [], rows: []}});
                const headerRow = table.querySelector('thead tr, tr');
                const headers = headerRow && headerRow.querySelector('th')
                    ? Array.from(headerRow.querySelectorAll('th, td')).map(c => c.textContent.trim())
                    : [];
                const rows = [];
                for (const row of Array.from(table.querySelectorAll('tr'))) {{
                    if (rows.length >= {max_rows}) break;
                    const cells = Array.from(row.querySelectorAll('td')).map(c => c.textContent.trim());
                    if (cells.length > 0) rows.push({{index: rows.length, data: cells}});
                }}
                return JSON.stringify({{headers, rows}});
                "#
            );
            let table = run_script(tab, &body)?;
            let headers: Vec<String> = table
                .get("headers")
                .and_then(Value::as_array)
                .map(|h| h.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            let rows = table.get("rows").and_then(Value::as_array).cloned().unwrap_or_default();
            let formatted: Vec<String> = rows
                .iter()
                .map(|row| {
                    let cells: Vec<&str> = row
                        .get("data")
                        .and_then(Value::as_array)
                        .map(|d| d.iter().filter_map(Value::as_str).collect())
                        .unwrap_or_default();
                    let line = if headers.is_empty() {
                        cells.join(" | ")
                    } else {
                        headers
                            .iter()
                            .zip(cells.iter())
                            .map(|(h, c)| format!("{}: {}", h, c))
                            .collect::<Vec<_>>()
                            .join(" | ")
                    };
                    format!("[{}] {}", row.get("index").and_then(Value::as_u64).unwrap_or(0), line)
                })
                .collect();
            Ok(ToolOutcome::ok(format!("Извлечено {} строк таблицы", rows.len()))
                .with("count", rows.len())
                .with("headers", headers)
                .with("formatted_items", formatted)
                .with("rows", rows))
        })
        .await
    }

    async fn extract_element_text(&self, index: usize) -> CapabilityResult {
        self.with_tab(move |tab| {
            let body = format!(
                r#"
                const list = visibleList('div, article, section, p, span, li', 50, 20);
                if ({index} >= list.length) return JSON.stringify({{found: false}});
                return JSON.stringify({{found: true, text: (list[{index}].textContent || '').trim()}});
                "#
            );
            let result = run_script(tab, &body)?;
            let text = text_of(&result, "text");
            if !found(&result) || text.is_empty() {
                return Ok(ToolOutcome::failure(format!("Элемент #{} не найден или пустой", index)));
            }
            let full_len = text.chars().count();
            Ok(ToolOutcome::ok(format!("Извлечён текст элемента #{}", index))
                .with("text", text.chars().take(ELEMENT_TEXT_MAX_CHARS).collect::<String>())
                .with("full_text_length", full_len))
        })
        .await
    }

    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> CapabilityResult {
        self.with_tab(move |tab| {
            let delta = match direction {
                ScrollDirection::Down => i64::from(amount),
                ScrollDirection::Up => -i64::from(amount),
            };
            tab.evaluate(&format!("window.scrollBy(0, {})", delta), false)
                .map_err(|e| format!("Ошибка прокрутки: {}", e))?;
            std::thread::sleep(Duration::from_millis(500));
            Ok(ToolOutcome::ok(format!(
                "Прокрутили {} на {}px",
                direction.as_str(),
                amount
            )))
        })
        .await
    }

    async fn press_enter(&self) -> CapabilityResult {
        self.with_tab(|tab| {
            tab.press_key("Enter")
                .map_err(|e| format!("Ошибка нажатия Enter: {}", e))?;
            std::thread::sleep(Duration::from_secs(1));
            Ok(ToolOutcome::ok("Нажали Enter"))
        })
        .await
    }

    async fn check_checkbox(&self, index: usize) -> CapabilityResult {
        self.with_tab(move |tab| {
            let body = format!(
                r#"
                const list = visibleList('input[type="checkbox"], [role="checkbox"]', 5, 5);
                if ({index} >= list.length) return JSON.stringify({{found: false}});
                const box = list[{index}];
                const was = !!box.checked;
                box.click();
                return JSON.stringify({{found: true, was_checked: was, now_checked: !was}});
                "#
            );
            let result = run_script(tab, &body)?;
            if !found(&result) {
                return Ok(ToolOutcome::failure(format!("Чекбокс #{} не найден", index)));
            }
            let now_checked = result.get("now_checked").and_then(Value::as_bool).unwrap_or(false);
            let state = if now_checked { "отмечен" } else { "снят" };
            Ok(ToolOutcome::ok(format!("Чекбокс #{} {}", index, state))
                .with("was_checked", !now_checked)
                .with("now_checked", now_checked))
        })
        .await
    }

    async fn hover_element(&self, index: usize) -> CapabilityResult {
        self.with_tab(move |tab| {
            let body = format!(
                r#"
                const list = visibleList('a, button, div, span, li, [role]', 10, 10);
                if ({index} >= list.length) return JSON.stringify({{found: false}});
                const el = list[{index}];
                el.scrollIntoView({{block: 'center'}});
                for (const type of ['mouseover', 'mouseenter', 'mousemove']) {{
                    el.dispatchEvent(new MouseEvent(type, {{bubbles: true}}));
                }}
                return JSON.stringify({{found: true}});
                "#
            );
            let result = run_script(tab, &body)?;
            if !found(&result) {
                return Ok(ToolOutcome::failure(format!("Элемент #{} не найден", index)));
            }
            std::thread::sleep(Duration::from_millis(500));
            Ok(ToolOutcome::ok(format!("Навели на элемент #{}", index)))
        })
        .await
    }

    async fn get_current_url(&self) -> CapabilityResult {
        self.with_tab(|tab| {
            let url = tab.get_url();
            Ok(ToolOutcome::ok(format!("Текущий URL: {}", url)).with("url", url))
        })
        .await
    }

    async fn wait_for_navigation(&self) -> CapabilityResult {
        self.with_tab(|tab| {
            // 超时也继续：页面可能已经加载完毕
            let message = match tab.wait_until_navigated() {
                Ok(_) => "Навигация завершена",
                Err(e) => {
                    tracing::warn!(error = %e, "wait for navigation");
                    "Таймаут ожидания (продолжаем работу)"
                }
            };
            std::thread::sleep(Duration::from_millis(500));
            Ok(ToolOutcome::ok(message))
        })
        .await
    }

    async fn wait_for_element(&self, selector: &str, timeout_ms: u64) -> CapabilityResult {
        let selector = selector.to_string();
        self.with_tab(move |tab| {
            match tab.wait_for_element_with_custom_timeout(&selector, Duration::from_millis(timeout_ms)) {
                Ok(_) => Ok(ToolOutcome::ok(format!("Элемент появился: {}", selector))),
                Err(_) => Ok(ToolOutcome::failure(format!(
                    "Таймаут ожидания элемента: {}",
                    selector
                ))),
            }
        })
        .await
    }
}
