//! Prompt templates for the intent classifier

pub fn route(query: &str) -> String {
    format!(
        r#"Decide whether the following message is about ordering or buying products, or is a greeting / unrelated small talk.

Message: "{query}"

Answer with exactly one word: "order" or "greeting"."#
    )
}

pub fn greeting(query: &str) -> String {
    format!(
        r#"The customer wrote: "{query}"

Reply in a friendly way. If it is a greeting, greet them back and mention that you can help them order products.
Keep it to one or two sentences."#
    )
}

pub fn extract_products(query: &str) -> String {
    format!(
        r#"Customer message: "{query}"

List every distinct product the customer mentions.
- One short search term per product, close to the customer's wording
- Only things that can be ordered (food, groceries, household goods)
- Use the singular form ("apples" -> "apple")
- Output a JSON array of strings

Examples:
- "Do you have apples, oranges and pineapples?" -> ["apple", "orange", "pineapple"]
- "I want to buy bananas" -> ["banana"]
- "Can I order some milk and bread?" -> ["milk", "bread"]

Output only the JSON array:"#
    )
}

pub fn order_intent(reply: &str) -> String {
    format!(
        r#"The customer answered: "{reply}"

Does the customer want to go ahead and order? The answer may be in any language.
Positive examples: yes, sure, I want, buy, order, take, เอา, ซื้อ, ต้องการ
Negative examples: no, don't want, cancel, ไม่, ไม่เอา

Answer "YES" if they want to order, otherwise "NO"."#
    )
}

pub fn quantity(reply: &str) -> String {
    format!(
        r#"The customer answered: "{reply}"

If the answer mentions a quantity, either as digits (1, 2, 3) or as a word in any language (one, two, หนึ่ง, สอง, สาม), answer with just that number, for example "3".
If no quantity is mentioned, answer "0"."#
    )
}
