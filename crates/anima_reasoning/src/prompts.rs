//! Prompt texts for the collaborators. The persona speaks Russian, so do
//! the prompts.

pub const CLASSIFIER_SYSTEM: &str = "Ты психологический аналитик. Определяй эмоциональные состояния точно и лаконично. Используй ТОЛЬКО состояния из предоставленного списка.";

pub const EMPATHY_SYSTEM: &str = "Ты эмоциональный координатор. Подбирай состояния для искренней эмпатии. Используй ТОЛЬКО состояния из дерева.";

pub const RESPONSE_NEED_SYSTEM: &str = "Ты диалоговый координатор. Определяй необходимость и стиль ответа на основе ТЕКУЩИХ СОСТОЯНИЙ бота.";

pub const GENERATOR_SYSTEM: &str =
    "Ты создаёшь ответы, которые соответствуют эмоциональному состоянию бота.";

pub const SPONTANEOUS_SYSTEM: &str =
    "Ты чуткий собеседник. Генерируй естественные спонтанные реплики.";

pub const REANALYSIS_SYSTEM: &str =
    "Ты аналитик состояний. Корректируй веса состояний на основе контекста диалога.";

pub const EXTRACTION_SYSTEM: &str =
    "Ты извлекаешь концепты из диалогов для формирования базы знаний.";

/// Maximum characters of the state tree quoted in a prompt.
pub const TREE_EXCERPT_CHARS: usize = 3000;

pub fn classify(utterance: &str, active: &[String], candidates: &[String], tree: &str) -> String {
    format!(
        r#"Проанализируй психологическое состояние собеседника по реплике:
"{utterance}"

Мои текущие активные состояния: {active}

ПОЛНЫЙ СПИСОК ДОСТУПНЫХ СОСТОЯНИЙ:
{candidates}

ДЕРЕВО СОСТОЯНИЙ С ЗАВИСИМОСТЯМИ:
{tree}

Верни JSON в формате:
{{"states": ["состояние1", "состояние2"], "confidence": 0.8, "reasoning": "краткое объяснение"}}"#,
        utterance = utterance,
        active = list(active),
        candidates = list(candidates),
        tree = tree,
    )
}

pub fn empathy(active: &str, interlocutor: &[String], tree: &str) -> String {
    format!(
        r#"Текущие мои активные состояния: {active}
Состояния собеседника: {interlocutor}

ДЕРЕВО СОСТОЯНИЙ:
{tree}

Активируй состояния для эмпатии. Учитывай связи в дереве состояний.
НЕ ОТКЛЮЧАЙ состояния просто так: они должны затухать естественно.

Верни JSON в формате:
{{"activate": ["состояние1"], "increase_weight": ["состояние2"], "reasoning": "обоснование"}}"#,
        active = or_none(active),
        interlocutor = list(interlocutor),
        tree = tree,
    )
}

pub fn response_need(active: &str, pressure: f32, utterance: &str, history: &[String]) -> String {
    format!(
        r#"Активные состояния бота: {active}
Давление на ответ: {pressure:.2}
Последняя реплика собеседника: "{utterance}"
История: {history}

Бот должен отвечать согласно своим состояниям. Если активны Гнев, Сомнение или Уточнение, ответ должен это отражать.
Нужно ли отвечать сейчас? Оцени срочность и сформулируй темы для ответа.

Верни JSON в формате:
{{"respond": true, "themes": ["тема1", "тема2"], "urgency": 0.7}}"#,
        active = or_none(active),
        pressure = pressure,
        utterance = utterance,
        history = history_block(history),
    )
}

pub fn generate(
    utterance: &str,
    themes: &[String],
    active: &str,
    related: &[String],
    memories: &[String],
) -> String {
    format!(
        r#"Сгенерируй естественный ответ на реплику: "{utterance}"

Ключевые темы для ответа: {themes}
Мои активные эмоциональные состояния: {active}
Контекст из базы знаний: {related}
Недавние эпизоды: {memories}

Ответ должен ОТРАЖАТЬ текущие состояния бота. Если активен Гнев, ответ может быть резким. Если активно Сомнение, в нём есть неуверенность. Если активно Уточнение, задавай вопросы.
Создай искренний, эмоционально согласованный ответ (1-2 предложения).

Верни JSON в формате:
{{"response": "текст ответа"}}"#,
        utterance = utterance,
        themes = list(themes),
        active = or_none(active),
        related = if related.is_empty() { "Нет данных".to_string() } else { related.join(", ") },
        memories = if memories.is_empty() { "Нет".to_string() } else { memories.join("; ") },
    )
}

pub fn spontaneous(triggered: &[String], top: &str, history: &[String]) -> String {
    format!(
        r#"Сгенерируй спонтанный ответ на основе накопленных состояний.

Состояния, достигшие максимума: {triggered}
Топ состояний: {top}
Последние реплики: {history}

Создай естественный спонтанный ответ (1-2 предложения), который отражает эти состояния.

Верни JSON в формате:
{{"text": "спонтанная реплика"}}"#,
        triggered = list(triggered),
        top = or_none(top),
        history = history_block(history),
    )
}

pub fn reanalyze(utterance: &str, response: &str, journal: &str, top: &str) -> String {
    format!(
        r#"Проанализируй диалог и определи, нужно ли скорректировать веса состояний.

Последняя реплика пользователя: "{utterance}"
Ответ бота: "{response}"

Контекст из памяти:
{journal}

Текущие топ состояния: {top}

Определи, какие состояния нужно усилить или ослабить.

Верни JSON в формате:
{{"increase": ["состояние1"], "decrease": ["состояние2"], "reasoning": "почему"}}"#,
        utterance = utterance,
        response = response,
        journal = if journal.trim().is_empty() { "Нет предыдущего контекста" } else { journal },
        top = or_none(top),
    )
}

pub fn extract(utterance: &str, response: &str, active: &[String]) -> String {
    format!(
        r#"Из этого диалога извлеки ключевые концепты и их связи:

Пользователь: "{utterance}"
Бот: "{response}"

Текущие состояния бота: {active}

Верни JSON в формате:
{{"concepts": [{{"name": "концепт", "type": "event|object|emotion|temporal", "associations": ["связанный"], "emotional_context": ["Состояние"]}}]}}

Если новых концептов нет, верни пустой список."#,
        utterance = utterance,
        response = response,
        active = list(active),
    )
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "[]".to_string()
    } else {
        format!("[{}]", items.join(", "))
    }
}

fn or_none(s: &str) -> &str {
    if s.trim().is_empty() {
        "нет"
    } else {
        s
    }
}

fn history_block(history: &[String]) -> String {
    if history.is_empty() {
        "Нет истории".to_string()
    } else {
        history.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_mentions_candidates() {
        let p = classify(
            "мне грустно",
            &[],
            &["Грусть".to_string(), "Гнев".to_string()],
            "Грусть: -",
        );
        assert!(p.contains("\"мне грустно\""));
        assert!(p.contains("[Грусть, Гнев]"));
        assert!(p.contains("\"states\""));
    }

    #[test]
    fn test_empty_context_placeholders() {
        let p = response_need("", 0.25, "привет", &[]);
        assert!(p.contains("0.25"));
        assert!(p.contains("Нет истории"));
        assert!(p.contains("Активные состояния бота: нет"));

        let p = reanalyze("a", "b", "  ", "");
        assert!(p.contains("Нет предыдущего контекста"));
    }
}
