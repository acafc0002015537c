//! 分析 prompt 构建：全部条目拼入一次请求，每条按字符数截断

use std::fmt::Write;

/// 按字符（非字节）截断
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

const SPAM_INSTRUCTIONS: &str = "Ты — эксперт по анализу спама. Твоя задача — проанализировать предоставленные тексты и определить, являются ли они спамом.

КРИТЕРИИ СПАМА:
1. Рекламные рассылки без явного согласия
2. Фишинг (запрос логинов, паролей, денег, персональных данных)
3. Подозрительные отправители (случайные символы, подделка известных компаний)
4. Массовые рассылки с шаблонным текстом
5. Предложения \"быстрого заработка\", казино, кредитов, лекарств
6. Срочные требования действовать \"прямо сейчас\"
7. Грамматические ошибки, странное форматирование
";

const JOB_INSTRUCTIONS: &str = "Ты — эксперт по подбору персонала. Твоя задача — проанализировать вакансии и определить их релевантность профилю кандидата.
";

/// 垃圾邮件分类 prompt
pub fn spam_prompt(items: &[String], max_chars: usize) -> String {
    let mut prompt = String::from(SPAM_INSTRUCTIONS);
    let _ = write!(
        prompt,
        r#"
ОТВЕТЬ ТОЛЬКО ВАЛИДНЫМ JSON, БЕЗ ТЕКСТА ДО ИЛИ ПОСЛЕ:
{{
    "analysis": [
        {{"index": 0, "is_spam": true, "confidence": 0.9, "reason": "краткое объяснение"}}
    ],
    "summary": {{"total": {total}, "spam_count": 0, "not_spam_count": 0}}
}}
Поле "index" — номер текста ниже. Оцени каждый из {total} текстов.

Тексты для анализа:
"#,
        total = items.len()
    );
    for (idx, item) in items.iter().enumerate() {
        let _ = write!(prompt, "\nТЕКСТ {}:\n{}\n", idx, truncate_chars(item, max_chars));
    }
    prompt
}

/// 职位匹配度 prompt（含候选人画像）
pub fn job_prompt(items: &[String], profile: Option<&str>, max_chars: usize) -> String {
    let mut prompt = String::from(JOB_INSTRUCTIONS);
    let _ = write!(
        prompt,
        r#"
ПРОФИЛЬ КАНДИДАТА:
{profile}

ИНСТРУКЦИЯ:
1. Проанализируй каждую вакансию
2. Оцени релевантность по шкале 0-1 (1 = идеально подходит)
3. Учитывай: технологии, опыт, требования, уровень позиции, обязанности
4. Определи ключевые совпадения и чего не хватает

ОТВЕТЬ ТОЛЬКО ВАЛИДНЫМ JSON, БЕЗ ТЕКСТА ДО ИЛИ ПОСЛЕ:
{{
    "analysis": [
        {{"index": 0, "relevance_score": 0.8, "key_matches": ["совпадение"], "missing_skills": ["навык"], "recommendation": "высокая"}}
    ],
    "summary": {{"total": {total}, "high_relevance": 0, "medium_relevance": 0, "low_relevance": 0}}
}}

ВАКАНСИИ ДЛЯ АНАЛИЗА:
"#,
        profile = profile.filter(|p| !p.trim().is_empty()).unwrap_or("(не указан)"),
        total = items.len()
    );
    for (idx, item) in items.iter().enumerate() {
        let _ = write!(prompt, "\nВАКАНСИЯ {}:\n{}\n", idx, truncate_chars(item, max_chars));
    }
    prompt
}
