struct FeatureCard {
    icon: &'static str,
    title: &'static str,
    description: &'static str,
    background: &'static str,
}

struct NavLink {
    href: &'static str,
    label: &'static str,
    class: &'static str,
}

const FEATURES: [FeatureCard; 3] = [
    FeatureCard {
        icon: "📱",
        title: "自动采集",
        description: "iOS 快捷指令自动监听短信",
        background: "bg-blue-50",
    },
    FeatureCard {
        icon: "🤖",
        title: "AI 解析",
        description: "DeepSeek 智能识别账单信息",
        background: "bg-purple-50",
    },
    FeatureCard {
        icon: "📊",
        title: "数据可视化",
        description: "多维度统计分析",
        background: "bg-green-50",
    },
];

const NAV_LINKS: [NavLink; 2] = [
    NavLink {
        href: "/transactions",
        label: "查看账单",
        class: "bg-blue-600 text-white hover:bg-blue-700",
    },
    NavLink {
        href: "/login",
        label: "登录",
        class: "bg-gray-200 text-gray-800 hover:bg-gray-300",
    },
];

fn feature_card(card: &FeatureCard) -> String {
    let FeatureCard {
        icon,
        title,
        description,
        background,
    } = card;
    format!(
        r#"
                <div class="{background} rounded-xl p-6">
                    <div class="text-4xl mb-3">{icon}</div>
                    <h3 class="font-semibold text-lg mb-2">{title}</h3>
                    <p class="text-sm text-gray-600">{description}</p>
                </div>"#
    )
}

fn nav_link(link: &NavLink) -> String {
    let NavLink { href, label, class } = link;
    format!(
        r#"
                <a href="{href}" class="inline-block {class} px-8 py-3 rounded-lg font-semibold transition">{label}</a>"#
    )
}

/// Landing page body: title, the three feature cards and the entry links.
pub fn home() -> String {
    let cards: String = FEATURES.iter().map(feature_card).collect();
    let links: String = NAV_LINKS.iter().map(nav_link).collect();

    format!(
        r#"<div class="min-h-screen bg-gradient-to-br from-blue-50 to-indigo-100 flex items-center justify-center p-4">
    <div class="max-w-4xl w-full bg-white rounded-2xl shadow-2xl p-8">
        <div class="text-center">
            <h1 class="text-5xl font-bold text-gray-900 mb-4">💰 EasyBill</h1>
            <p class="text-xl text-gray-600 mb-8">智能账单管理系统</p>
            <div class="grid md:grid-cols-3 gap-6 mt-12">{cards}
            </div>
            <div class="mt-12 space-x-4">{links}
            </div>
        </div>
    </div>
</div>"#
    )
}
